use crate::command::{Command, MAX_ARGS};
use crate::lexer::Token;
use crate::signals::Mode;
use thiserror::Error;

/// Result of parsing one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    /// A command ready for dispatch.
    Command(Command),
    /// Blank line or comment; nothing to run.
    Nothing,
}

/// Errors that can occur during the parsing phase.
///
/// Any of these discards the whole line; no partial command is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// A positional argument appeared after `<` or `>`.
    #[error("Error: command arguments must precede input/output redirection.")]
    ArgumentAfterRedirect(String),
    /// `<` or `>` was not followed by a file name.
    #[error("Error: missing file name after '{0}'.")]
    MissingRedirectTarget(&'static str),
    /// The same redirection was given twice.
    #[error("Error: only one '{0}' redirection is allowed.")]
    DuplicateRedirect(&'static str),
    /// Only operators, no program name.
    #[error("Error: missing command.")]
    MissingCommand,
    #[error("Error: too many arguments (limit is {}).", MAX_ARGS)]
    TooManyArguments,
}

struct CommandBuilder {
    tokens: Vec<Token>,
    pos: usize,
    argv: Vec<String>,
    input: Option<String>,
    output: Option<String>,
    background: bool,
    redirecting: bool,
}

impl CommandBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        CommandBuilder {
            tokens,
            pos: 0,
            argv: Vec::new(),
            input: None,
            output: None,
            background: false,
            redirecting: false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_last(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn build(mut self, mode: Mode) -> Result<Parsed, ParsingError> {
        match self.peek() {
            None => return Ok(Parsed::Nothing),
            Some(Token::Word(w)) if w.starts_with('#') => return Ok(Parsed::Nothing),
            _ => {}
        }

        while let Some(token) = self.consume() {
            match token {
                Token::RedirectIn => {
                    let target = self.parse_target("<")?;
                    if self.input.replace(target).is_some() {
                        return Err(ParsingError::DuplicateRedirect("<"));
                    }
                }
                Token::RedirectOut => {
                    let target = self.parse_target(">")?;
                    if self.output.replace(target).is_some() {
                        return Err(ParsingError::DuplicateRedirect(">"));
                    }
                }
                // Only the final `&` marks a background job; foreground-only
                // mode drops it silently.
                Token::Ampersand if self.is_last() => {
                    self.background = mode == Mode::Normal;
                }
                other => self.push_argument(other.as_str())?,
            }
        }

        if self.argv.is_empty() {
            return Err(ParsingError::MissingCommand);
        }
        Ok(Parsed::Command(Command::new(
            self.argv,
            self.input,
            self.output,
            self.background,
        )))
    }

    /// A redirect operator consumes the following token, whatever it is, as
    /// a file name and ends argument collection.
    fn parse_target(&mut self, op: &'static str) -> Result<String, ParsingError> {
        self.redirecting = true;
        self.consume()
            .map(|token| token.as_str().to_string())
            .ok_or(ParsingError::MissingRedirectTarget(op))
    }

    fn push_argument(&mut self, arg: &str) -> Result<(), ParsingError> {
        if self.redirecting {
            return Err(ParsingError::ArgumentAfterRedirect(arg.to_string()));
        }
        if self.argv.len() == MAX_ARGS {
            return Err(ParsingError::TooManyArguments);
        }
        self.argv.push(arg.to_string());
        Ok(())
    }
}

/// Builds a [`Command`] from a token sequence.
///
/// Grammar: `command [arg]* [< infile] [> outfile] [&]`. The background marker
/// is honoured only in [`Mode::Normal`].
pub fn parse(tokens: Vec<Token>, mode: Mode) -> Result<Parsed, ParsingError> {
    CommandBuilder::from(tokens).build(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse_line(line: &str, mode: Mode) -> Result<Parsed, ParsingError> {
        parse(split_into_tokens(line).unwrap(), mode)
    }

    fn command(line: &str, mode: Mode) -> Command {
        match parse_line(line, mode) {
            Ok(Parsed::Command(cmd)) => cmd,
            other => panic!("expected a command for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_background_with_output_redirect() {
        let cmd = command("ls -l > out.txt &", Mode::Normal);
        assert_eq!(cmd.argv(), &["ls".to_string(), "-l".to_string()]);
        assert_eq!(cmd.output(), Some("out.txt"));
        assert_eq!(cmd.input(), None);
        assert!(cmd.is_background());
    }

    #[test]
    fn test_foreground_only_mode_drops_marker() {
        let cmd = command("ls -l > out.txt &", Mode::ForegroundOnly);
        assert_eq!(cmd.argv(), &["ls".to_string(), "-l".to_string()]);
        assert_eq!(cmd.output(), Some("out.txt"));
        assert!(!cmd.is_background());
    }

    #[test]
    fn test_both_redirects_in_any_order() {
        let cmd = command("echo hi > out < in", Mode::Normal);
        assert_eq!(cmd.argv(), &["echo".to_string(), "hi".to_string()]);
        assert_eq!(cmd.output(), Some("out"));
        assert_eq!(cmd.input(), Some("in"));
    }

    #[test]
    fn test_argument_after_redirect_fails() {
        assert_eq!(
            parse_line("echo > out hi", Mode::Normal),
            Err(ParsingError::ArgumentAfterRedirect("hi".to_string()))
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_noops() {
        assert_eq!(parse_line("", Mode::Normal), Ok(Parsed::Nothing));
        assert_eq!(parse_line("   ", Mode::Normal), Ok(Parsed::Nothing));
        assert_eq!(parse_line("# ls > x", Mode::Normal), Ok(Parsed::Nothing));
        assert_eq!(parse_line("#comment", Mode::Normal), Ok(Parsed::Nothing));
    }

    #[test]
    fn test_hash_inside_arguments_is_text() {
        let cmd = command("echo #not-a-comment", Mode::Normal);
        assert_eq!(cmd.args(), &["#not-a-comment".to_string()]);
    }

    #[test]
    fn test_ampersand_not_last_is_an_argument() {
        let cmd = command("echo & done", Mode::Normal);
        assert_eq!(cmd.args(), &["&".to_string(), "done".to_string()]);
        assert!(!cmd.is_background());

        assert_eq!(
            parse_line("cat < in & x", Mode::Normal),
            Err(ParsingError::ArgumentAfterRedirect("&".to_string()))
        );
    }

    #[test]
    fn test_missing_redirect_target() {
        assert_eq!(
            parse_line("cat <", Mode::Normal),
            Err(ParsingError::MissingRedirectTarget("<"))
        );
        assert_eq!(
            parse_line("cat < in >", Mode::Normal),
            Err(ParsingError::MissingRedirectTarget(">"))
        );
    }

    #[test]
    fn test_operator_token_as_redirect_target() {
        let cmd = command("cat > &", Mode::Normal);
        assert_eq!(cmd.output(), Some("&"));
        assert!(!cmd.is_background());

        let cmd = command("sort < > > <", Mode::Normal);
        assert_eq!(cmd.input(), Some(">"));
        assert_eq!(cmd.output(), Some("<"));

        assert_eq!(
            parse_line("echo > < in", Mode::Normal),
            Err(ParsingError::ArgumentAfterRedirect("in".to_string()))
        );
    }

    #[test]
    fn test_duplicate_redirect() {
        assert_eq!(
            parse_line("cat < a < b", Mode::Normal),
            Err(ParsingError::DuplicateRedirect("<"))
        );
    }

    #[test]
    fn test_operators_without_command() {
        assert_eq!(
            parse_line("< in", Mode::Normal),
            Err(ParsingError::MissingCommand)
        );
        assert_eq!(parse_line("&", Mode::Normal), Err(ParsingError::MissingCommand));
    }

    #[test]
    fn test_argument_limit() {
        let at_limit = vec!["x"; MAX_ARGS].join(" ");
        let cmd = command(&at_limit, Mode::Normal);
        assert_eq!(cmd.argv().len(), MAX_ARGS);
        assert!(!cmd.program().is_empty());

        let over = vec!["x"; MAX_ARGS + 1].join(" ");
        assert_eq!(
            parse_line(&over, Mode::Normal),
            Err(ParsingError::TooManyArguments)
        );
    }
}
