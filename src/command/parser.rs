//! Keyword-driven command parser

use crate::command::{Command, KeywordTable, Menu};
use crate::identity::{has_word_length, Word};

#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    keywords: KeywordTable,
}

impl CommandParser {
    pub fn new(keywords: KeywordTable) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// First match wins; see the ordering of the checks below
    pub fn parse(&self, raw: &str) -> Command {
        let trimmed = raw.trim();
        let (text, has_prefix) = match trimmed.strip_prefix(['/', '#']) {
            Some(rest) => (rest.trim(), true),
            None => (trimmed, false),
        };
        let kw = &self.keywords;

        if has_prefix || !kw.require_prefix {
            if let Some(command) = self.parse_keyword_command(text) {
                return command;
            }
        }

        if let Some(rest) = strip_keyword(text, &kw.font_prefix) {
            return font_command(rest);
        }

        // `<n>.<word>` belongs to quiz registration / answers
        if text.contains('.') {
            return Command::Unknown;
        }

        if has_word_length(text) {
            return match Word::parse(text) {
                Ok(word) => Command::Both { word },
                Err(_) => Command::InvalidWord,
            };
        }

        Command::Unknown
    }

    fn parse_keyword_command(&self, text: &str) -> Option<Command> {
        let kw = &self.keywords;

        if kw.help.iter().any(|k| !k.is_empty() && k == text) {
            return Some(Command::Help);
        }

        if let Some((key, value)) = self.parse_setting(text) {
            return Some(Command::Setting { key, value });
        }

        if kw.list.iter().any(|k| !k.is_empty() && k == text) {
            return Some(Command::List);
        }

        if let Some((_, menu)) = kw.menus().into_iter().find(|(k, _)| !k.is_empty() && *k == text) {
            return Some(Command::Menu(menu));
        }

        if !kw.mode_common.is_empty() && text == kw.mode_common {
            return Some(Command::ModeCommon);
        }
        if !kw.mode_union.is_empty() && text == kw.mode_union {
            return Some(Command::ModeUnion);
        }

        strip_keyword(text, &kw.font).map(font_command)
    }

    /// `<setting keyword> <key>=<value>`; key is lowercased
    fn parse_setting(&self, text: &str) -> Option<(String, String)> {
        let rest = strip_keyword(text, &self.keywords.setting)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let (key, value) = rest.trim().split_once('=')?;
        let (key, value) = (key.trim().to_lowercase(), value.trim());
        if key.is_empty() || value.is_empty() {
            return None;
        }
        Some((key, value.to_string()))
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    if keyword.is_empty() {
        return None;
    }
    text.strip_prefix(keyword)
}

fn font_command(rest: &str) -> Command {
    let value = rest.trim();
    if value.is_empty() {
        Command::Menu(Menu::Font)
    } else {
        Command::Font {
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::default()
    }

    #[test]
    fn test_help_requires_prefix_by_default() {
        assert_eq!(parser().parse("#ヘルプ"), Command::Help);
        assert_eq!(parser().parse(" /help "), Command::Help);
        assert_eq!(
            parser().parse("ヘルプ"),
            Command::Both {
                word: Word::parse("ヘルプ").unwrap()
            }
        );
    }

    #[test]
    fn test_prefix_optional_deployment() {
        let parser = CommandParser::new(KeywordTable {
            require_prefix: false,
            ..KeywordTable::default()
        });
        assert_eq!(parser.parse("ヘルプ"), Command::Help);
        assert_eq!(parser.parse("一覧"), Command::List);
        assert_eq!(parser.parse("和集合モード"), Command::ModeUnion);
    }

    #[test]
    fn test_setting_parse() {
        assert_eq!(
            parser().parse("#設定 FONT = mincho"),
            Command::Setting {
                key: "font".to_string(),
                value: "mincho".to_string()
            }
        );
        // malformed settings fall through to the menu keyword
        assert_eq!(parser().parse("#設定"), Command::Menu(Menu::Settings));
        assert!(!matches!(parser().parse("#設定 font="), Command::Setting { .. }));
        assert!(!matches!(parser().parse("#設定 =x"), Command::Setting { .. }));
        assert!(!matches!(parser().parse("#設定font=x"), Command::Setting { .. }));
    }

    #[test]
    fn test_menus_and_modes() {
        assert_eq!(parser().parse("#画像生成"), Command::Menu(Menu::Generate));
        assert_eq!(parser().parse("#問題一覧"), Command::Menu(Menu::List));
        assert_eq!(parser().parse("#フォント選択"), Command::Menu(Menu::Font));
        assert_eq!(parser().parse("#共通部分モード"), Command::ModeCommon);
        assert_eq!(parser().parse("#一覧"), Command::List);
    }

    #[test]
    fn test_font_keyword_and_prefix() {
        assert_eq!(
            parser().parse("#フォント mincho"),
            Command::Font {
                value: "mincho".to_string()
            }
        );
        assert_eq!(parser().parse("#フォント"), Command::Menu(Menu::Font));
        assert_eq!(
            parser().parse("font_dejavu"),
            Command::Font {
                value: "dejavu".to_string()
            }
        );
        assert_eq!(parser().parse("font_"), Command::Menu(Menu::Font));
    }

    #[test]
    fn test_empty_keywords_never_match() {
        let parser = CommandParser::new(KeywordTable {
            font: String::new(),
            font_prefix: String::new(),
            ..KeywordTable::default()
        });
        assert_eq!(
            parser.parse("#森林"),
            Command::Both {
                word: Word::parse("森林").unwrap()
            }
        );
    }

    #[test]
    fn test_word_classification() {
        assert_eq!(parser().parse(""), Command::Unknown);
        assert_eq!(parser().parse("森"), Command::Unknown);
        assert_eq!(parser().parse("森!"), Command::InvalidWord);
        assert_eq!(parser().parse("一二三四五六七八九"), Command::Unknown);
        assert_eq!(parser().parse("3.森林"), Command::Unknown);
        assert_eq!(
            parser().parse(" 森林 "),
            Command::Both {
                word: Word::parse("森林").unwrap()
            }
        );
    }
}
