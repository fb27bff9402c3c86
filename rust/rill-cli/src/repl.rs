//! Interactive REPL for the Rill language.

use rill_compiler::{parse_phrase, parse_program};
use rill_rt::ProgState;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}
fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

const HELP: &str = "\
  :help          show this help
  :env           list bound names
  :load FILE     run a script in this session
  :reset         start the session over
  :quit          leave the REPL

  val x = e      bind a value        rec f = fn x -> e   bind recursively
  data T = C x   declare constructors
  (e1 | e2)      run concurrently    send c v / recv c   rendezvous
";

pub fn run() {
    println!("{}", bold(&format!("rill {}", env!("CARGO_PKG_VERSION"))));
    println!("{}", gray("Type :help for help, :quit to exit."));

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("{} cannot start line editor: {}", red("error:"), err);
            return;
        }
    };
    let mut state = ProgState::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "rill> " } else { "  ..> " };
        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim_start().starts_with(':') {
                    let _ = editor.add_history_entry(line.trim());
                    if handle_command(line.trim(), &mut state) {
                        break;
                    }
                    continue;
                }
                buffer.push_str(&line);
                buffer.push('\n');
                if is_incomplete(&buffer) {
                    continue;
                }
                let input = std::mem::take(&mut buffer);
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);
                eval_input(input, &mut state);
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("{}", gray("(interrupted)"));
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {}", red("error:"), err);
                break;
            }
        }
    }
}

fn eval_input(input: &str, state: &mut ProgState) {
    match parse_phrase(input) {
        Ok(phrase) => match rill_rt::obey(&phrase, state) {
            Ok((shown, next)) => {
                println!("{}", shown);
                *state = next;
            }
            // state is untouched: the failed phrase's effects are discarded
            Err(err) => eprintln!("{} {}", red("runtime error:"), err),
        },
        Err(err) => eprintln!("{} {}", red("parse error:"), err),
    }
}

/// Returns true when the session should end.
fn handle_command(command: &str, state: &mut ProgState) -> bool {
    let (head, rest) = match command.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (command, ""),
    };
    match head {
        ":quit" | ":q" => return true,
        ":help" | ":h" => print!("{}", HELP),
        ":env" => {
            for name in state.env.names() {
                println!("{}", cyan(&name));
            }
        }
        ":reset" => {
            *state = ProgState::new();
            println!("{}", gray("(session reset)"));
        }
        ":load" => {
            if rest.is_empty() {
                eprintln!("{} usage: :load FILE", red("error:"));
            } else {
                load_file(rest, state);
            }
        }
        other => eprintln!("{} unknown command '{}'", red("error:"), other),
    }
    false
}

fn load_file(path: &str, state: &mut ProgState) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{} cannot read {}: {}", red("error:"), path, err);
            return;
        }
    };
    let phrases = match parse_program(&source) {
        Ok(phrases) => phrases,
        Err(err) => {
            eprintln!("{} {}", red("parse error:"), err);
            return;
        }
    };
    for phrase in &phrases {
        match rill_rt::obey(phrase, state) {
            Ok((shown, next)) => {
                println!("{}", shown);
                *state = next;
            }
            Err(err) => {
                eprintln!("{} {}", red("runtime error:"), err);
                return;
            }
        }
    }
}

/// A submission is held open while parentheses are unbalanced, so parallel
/// compositions can be written across lines.
fn is_incomplete(input: &str) -> bool {
    let mut parens: i32 = 0;
    for line in input.lines() {
        // ignore everything behind a comment marker
        let code = line.split("--").next().unwrap_or("");
        for ch in code.chars() {
            match ch {
                '(' => parens += 1,
                ')' => parens -= 1,
                _ => {}
            }
        }
    }
    parens > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_input_is_complete() {
        assert!(!is_incomplete("1 + 2"));
        assert!(!is_incomplete("(send c 1 | recv c)"));
    }

    #[test]
    fn test_open_paren_holds_the_submission() {
        assert!(is_incomplete("(send c 1 |"));
        assert!(is_incomplete("((1 | 2)"));
    }

    #[test]
    fn test_comments_do_not_count() {
        assert!(!is_incomplete("1 -- (unclosed in a comment"));
    }

    #[test]
    fn test_overclosed_input_is_complete() {
        // let the parser report the error instead of holding the prompt
        assert!(!is_incomplete("1)"));
    }
}
