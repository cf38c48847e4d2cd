//! Line classification and argument splitting

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CASE_INSENSITIVE, CASE_SENSITIVE, Command, DIRECTIVE_PREFIX, Directive, ParseError, ParsedLine, Verb};

/// Optional `<TARGET>:` segment after the prefix, then the remainder
static DIRECTIVE_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^AGENT:\s*(?:(?P<target>[^\s:\[\]]+)\s*:)?\s*(?P<rest>.*)$").unwrap());

/// Classify one line of model output
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim_end();

    if !line.starts_with(DIRECTIVE_PREFIX) {
        return ParsedLine::Text(line.to_string());
    }

    let Some(caps) = DIRECTIVE_HEAD.captures(line) else {
        return ParsedLine::Invalid(ParseError::MissingPrefix);
    };

    let mut target = caps.name("target").map(|m| m.as_str().to_string());
    let mut rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");

    // `AGENT: SEARCH: [a]` names a verb, not an agent
    if target.as_deref().and_then(Verb::from_keyword).is_some() {
        rest = line[DIRECTIVE_PREFIX.len()..].trim_start();
        target = None;
    }

    let keyword = verb_token(rest);
    if keyword.is_empty() {
        return ParsedLine::Invalid(ParseError::MissingVerb);
    }

    let keyword = keyword.trim_end_matches(':');
    match Verb::from_keyword(keyword) {
        Some(verb) => match argument_block(rest) {
            Some(block) => ParsedLine::Directive(Directive::new(verb, target, block.to_string())),
            None => ParsedLine::Invalid(ParseError::MissingBrackets(verb)),
        },
        None => match target {
            Some(target) => ParsedLine::Message {
                target,
                body: rest.trim().to_string(),
            },
            None => ParsedLine::Invalid(ParseError::UnknownVerb(keyword.to_string())),
        },
    }
}

/// Leading keyword of the remainder, stopping at whitespace or `[`
fn verb_token(rest: &str) -> &str {
    let end = rest.find(|c: char| c.is_whitespace() || c == '[').unwrap_or(rest.len());
    &rest[..end]
}

/// Text between the first `[` and the last `]`
fn argument_block(rest: &str) -> Option<&str> {
    let open = rest.find('[')?;
    let close = rest.rfind(']')?;
    if close <= open {
        return None;
    }
    Some(&rest[open + 1..close])
}

/// Flat comma split; every field trimmed, order preserved
pub fn split_fields(block: &str) -> Vec<String> {
    block.split(',').map(|field| field.trim().to_string()).collect()
}

fn non_empty(fields: impl IntoIterator<Item = String>) -> Vec<String> {
    fields.into_iter().filter(|f| !f.is_empty()).collect()
}

fn required_paths(verb: Verb, fields: impl IntoIterator<Item = String>) -> Result<Vec<String>, ParseError> {
    let paths = non_empty(fields);
    if paths.is_empty() {
        return Err(ParseError::MissingArgument { verb, what: "path" });
    }
    Ok(paths)
}

fn required_phrase(verb: Verb, fields: &mut impl Iterator<Item = String>) -> Result<String, ParseError> {
    match fields.next() {
        Some(phrase) if !phrase.is_empty() => Ok(phrase),
        _ => Err(ParseError::MissingArgument {
            verb,
            what: "search phrase",
        }),
    }
}

/// Apply the verb-specific argument shape
pub(super) fn build_command(verb: Verb, block: &str) -> Result<Command, ParseError> {
    match verb {
        Verb::Search => Ok(Command::Search {
            paths: required_paths(verb, split_fields(block))?,
        }),
        Verb::SearchContent => {
            let mut fields = split_fields(block).into_iter();
            let phrase = required_phrase(verb, &mut fields)?;
            Ok(Command::SearchContent {
                phrase,
                paths: required_paths(verb, fields)?,
            })
        }
        Verb::WebSearch => {
            let query = block.trim();
            if query.is_empty() {
                return Err(ParseError::MissingArgument { verb, what: "query" });
            }
            Ok(Command::WebSearch {
                query: query.to_string(),
            })
        }
        Verb::TalkTo => {
            let (target, message) = block.split_once(',').ok_or(ParseError::MissingArgument {
                verb,
                what: "message",
            })?;
            let (target, message) = (target.trim(), message.trim());
            if target.is_empty() {
                return Err(ParseError::MissingArgument {
                    verb,
                    what: "target agent",
                });
            }
            if message.is_empty() {
                return Err(ParseError::MissingArgument { verb, what: "message" });
            }
            Ok(Command::TalkTo {
                target: target.to_string(),
                message: message.to_string(),
            })
        }
        Verb::ListFiles => {
            let mut fields = split_fields(block).into_iter();
            let root = fields.next().filter(|r| !r.is_empty()).unwrap_or_else(|| ".".to_string());
            Ok(Command::ListFiles {
                root,
                extensions: non_empty(fields),
            })
        }
        Verb::Grep => {
            let mut fields = split_fields(block).into_iter();
            let phrase = required_phrase(verb, &mut fields)?;
            let root = fields.next().filter(|r| !r.is_empty()).unwrap_or_else(|| ".".to_string());
            let mode = fields.next().unwrap_or_default().to_ascii_lowercase();
            let case_sensitive = match mode.as_str() {
                "" | CASE_INSENSITIVE => false,
                CASE_SENSITIVE => true,
                _ => return Err(ParseError::InvalidArgument { verb, value: mode }),
            };
            Ok(Command::Grep {
                phrase,
                root,
                case_sensitive,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(line: &str) -> Directive {
        match parse_line(line) {
            ParsedLine::Directive(d) => d,
            other => panic!("expected directive, got {:?}", other),
        }
    }

    fn command(line: &str) -> Command {
        directive(line).command().unwrap()
    }

    #[test]
    fn test_plain_text_is_never_a_directive() {
        for line in ["hello world", " AGENT: SEARCH[a]", "agent: SEARCH[a]", "", "AGENT SEARCH[a]"] {
            assert_eq!(parse_line(line), ParsedLine::Text(line.trim_end().to_string()));
        }
    }

    #[test]
    fn test_trailing_whitespace_is_trimmed() {
        let d = directive("AGENT: SEARCH[a.txt]   \r");
        assert_eq!(d.argument_block(), "a.txt");
    }

    #[test]
    fn test_search_aliases() {
        let expected = Command::Search {
            paths: vec!["a.txt".into(), "b.txt".into()],
        };
        assert_eq!(command("AGENT: SEARCH[a.txt, b.txt]"), expected);
        assert_eq!(command("AGENT: FILESEARCHRESULTS [ a.txt ,b.txt ]"), expected);
    }

    #[test]
    fn test_search_content_splits_phrase_from_paths() {
        assert_eq!(
            command("AGENT: FILECONTENTSEARCHRESULTS[fn main, src/main.rs, src/lib.rs]"),
            Command::SearchContent {
                phrase: "fn main".into(),
                paths: vec!["src/main.rs".into(), "src/lib.rs".into()],
            }
        );
    }

    #[test]
    fn test_search_content_requires_phrase() {
        let d = directive("AGENT: SEARCHCONTENT[ , a.txt]");
        assert!(matches!(d.command(), Err(ParseError::MissingArgument { .. })));
    }

    #[test]
    fn test_websearch_keeps_commas() {
        assert_eq!(
            command("AGENT: WEBSEARCH[rust, tokio, timeouts]"),
            Command::WebSearch {
                query: "rust, tokio, timeouts".into()
            }
        );
    }

    #[test]
    fn test_talkto_rejoins_message() {
        assert_eq!(
            command("AGENT: TALKTO[Bob, hi Bob, how are you?]"),
            Command::TalkTo {
                target: "Bob".into(),
                message: "hi Bob, how are you?".into(),
            }
        );
    }

    #[test]
    fn test_talkto_without_message_fails() {
        let d = directive("AGENT: TALKTO[Bob]");
        assert!(d.command().is_err());
    }

    #[test]
    fn test_first_open_last_close_bracket() {
        let d = directive("AGENT: SEARCHCONTENT[v[0], data[1].txt]");
        assert_eq!(d.argument_block(), "v[0], data[1].txt");
        assert_eq!(d.fields(), vec!["v[0]", "data[1].txt"]);
    }

    #[test]
    fn test_missing_brackets_is_invalid() {
        assert_eq!(
            parse_line("AGENT: FILESEARCHRESULTS no brackets here"),
            ParsedLine::Invalid(ParseError::MissingBrackets(Verb::Search))
        );
        assert_eq!(
            parse_line("AGENT: SEARCH] a.txt ["),
            ParsedLine::Invalid(ParseError::MissingBrackets(Verb::Search))
        );
    }

    #[test]
    fn test_unknown_verb_is_invalid() {
        assert_eq!(
            parse_line("AGENT: DELETE[a.txt]"),
            ParsedLine::Invalid(ParseError::UnknownVerb("DELETE".into()))
        );
        assert_eq!(parse_line("AGENT:"), ParsedLine::Invalid(ParseError::MissingVerb));
    }

    #[test]
    fn test_verbs_are_case_sensitive() {
        assert!(matches!(
            parse_line("AGENT: search[a.txt]"),
            ParsedLine::Invalid(ParseError::UnknownVerb(_))
        ));
    }

    #[test]
    fn test_delegation_form_carries_target() {
        let d = directive("AGENT: Linus: SEARCHCONTENT[todo, notes.md]");
        assert_eq!(d.target(), Some("Linus"));
        assert_eq!(d.verb(), Verb::SearchContent);
    }

    #[test]
    fn test_verb_followed_by_colon_is_direct_form() {
        let d = directive("AGENT: FILESEARCHRESULTS: [a.txt]");
        assert_eq!(d.target(), None);
        assert_eq!(d.verb(), Verb::Search);
    }

    #[test]
    fn test_colon_inside_arguments_is_not_a_target() {
        let d = directive("AGENT: WEBSEARCH[rust: the book]");
        assert_eq!(d.target(), None);
        assert_eq!(d.argument_block(), "rust: the book");
    }

    #[test]
    fn test_addressed_message() {
        assert_eq!(
            parse_line("AGENT: Karen: please draft the onboarding email"),
            ParsedLine::Message {
                target: "Karen".into(),
                body: "please draft the onboarding email".into(),
            }
        );
    }

    #[test]
    fn test_addressed_without_body_is_invalid() {
        assert_eq!(parse_line("AGENT: Karen:"), ParsedLine::Invalid(ParseError::MissingVerb));
    }

    #[test]
    fn test_rendered_command_parses_back() {
        for line in [
            "AGENT: FILECONTENTSEARCHRESULTS[  needle ,a.txt,  b.txt ]",
            "AGENT: TALKTO[Bob,  hello, there ]",
            "AGENT: LISTFILES[src, .rs]",
            "AGENT: GREP[needle, docs, case]",
        ] {
            let original = command(line);
            assert_eq!(command(&original.to_line()), original);
        }
    }

    #[test]
    fn test_listfiles_defaults_to_current_directory() {
        assert_eq!(
            command("AGENT: LISTFILES[]"),
            Command::ListFiles {
                root: ".".into(),
                extensions: vec![],
            }
        );
    }

    #[test]
    fn test_search_without_paths_is_invalid() {
        for line in ["AGENT: SEARCH[]", "AGENT: SEARCH[ , ]", "AGENT: SEARCHCONTENT[needle]"] {
            assert!(
                matches!(directive(line).command(), Err(ParseError::MissingArgument { what: "path", .. })),
                "{}",
                line
            );
        }
    }

    #[test]
    fn test_grep_defaults_to_workspace_and_ignoring_case() {
        assert_eq!(
            command("AGENT: FINDSTRING[Python]"),
            Command::Grep {
                phrase: "Python".into(),
                root: ".".into(),
                case_sensitive: false,
            }
        );
        assert_eq!(
            command("AGENT: GREP[Python, src, CASE]"),
            Command::Grep {
                phrase: "Python".into(),
                root: "src".into(),
                case_sensitive: true,
            }
        );
    }

    #[test]
    fn test_grep_rejects_unknown_mode() {
        assert_eq!(
            directive("AGENT: GREP[x, ., loud]").command(),
            Err(ParseError::InvalidArgument {
                verb: Verb::Grep,
                value: "loud".into(),
            })
        );
        assert!(directive("AGENT: GREP[ , src]").command().is_err());
    }

    #[test]
    fn test_empty_search_fields_dropped() {
        assert_eq!(
            command("AGENT: SEARCH[a.txt, , ]"),
            Command::Search {
                paths: vec!["a.txt".into()]
            }
        );
    }
}
