//! Interactive shell over one persistent engine instance.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::Quill;

const PROMPT: &str = ">> ";
const CONTINUATION_PROMPT: &str = ".. ";

/// Run the REPL until EOF or interrupt.
pub fn run() -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut quill = Quill::new();

    println!("Quill {} (:q quits)", env!("CARGO_PKG_VERSION"));

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && matches!(line.trim(), ":q" | ":quit" | "exit") {
                    break;
                }
                buffer.push_str(&line);
                buffer.push('\n');

                // Keep reading while delimiters are unbalanced.
                if open_delimiters(&buffer) > 0 {
                    continue;
                }

                let source = std::mem::take(&mut buffer);
                if source.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(source.trim())?;
                match quill.eval(&source) {
                    Ok(value) => println!("{}", value.to_display()),
                    Err(err) => eprintln!("{}", err.report()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Net count of unclosed brackets, ignoring string contents.
fn open_delimiters(source: &str) -> i32 {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in source.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_delimiters() {
        assert_eq!(open_delimiters("fun f() {"), 1);
        assert_eq!(open_delimiters("fun f() { }"), 0);
        assert_eq!(open_delimiters("'({'"), 0);
        assert_eq!(open_delimiters("[1, [2,"), 2);
    }
}
