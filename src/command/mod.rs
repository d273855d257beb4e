//! Chat command interpretation
//!
//! [`CommandParser`] turns free-form chat text into a [`Command`] using a
//! configurable [`KeywordTable`]. Quiz registration (`<n>.<word>`) and the
//! bulk quiz list are parsed by the helpers in [`quiz`]; the parser only
//! defers on them.

pub mod parser;
pub mod quiz;

use serde::{Deserialize, Serialize};

use crate::identity::Word;

pub use parser::CommandParser;
pub use quiz::{parse_bulk_list, parse_quiz_message, plan_bulk_update, BulkListError, QuizMessage};

/// Navigation prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Generate,
    Register,
    List,
    Settings,
    Usage,
    Mode,
    Font,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Menu(Menu),
    Setting { key: String, value: String },
    Font { value: String },
    ModeCommon,
    ModeUnion,
    List,
    /// Compose request for a validated word
    Both { word: Word },
    InvalidWord,
    Unknown,
}

/// Literal trigger strings for each command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTable {
    /// Menu / setting commands only match after a leading `/` or `#`
    pub require_prefix: bool,
    pub help: Vec<String>,
    pub setting: String,
    pub font: String,
    /// Matched with or without a command prefix (quick-reply payloads)
    pub font_prefix: String,
    pub list: Vec<String>,
    pub menu_generate: String,
    pub menu_register: String,
    pub menu_list: String,
    pub menu_settings: String,
    pub menu_usage: String,
    pub menu_mode: String,
    pub menu_font: String,
    pub mode_common: String,
    pub mode_union: String,
    /// Group answer-release trigger (`@bot 答え 3`)
    pub answer_keyword: String,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let s = |v: &str| v.to_string();
        Self {
            require_prefix: true,
            help: vec![s("ヘルプ"), s("help")],
            setting: s("設定"),
            font: s("フォント"),
            font_prefix: s("font_"),
            list: vec![s("一覧")],
            menu_generate: s("画像生成"),
            menu_register: s("問題登録"),
            menu_list: s("問題一覧"),
            menu_settings: s("設定"),
            menu_usage: s("使い方"),
            menu_mode: s("出題モード"),
            menu_font: s("フォント選択"),
            mode_common: s("共通部分モード"),
            mode_union: s("和集合モード"),
            answer_keyword: s("答え"),
        }
    }
}

impl KeywordTable {
    /// Text a quick-reply button sends to trigger `keyword`
    pub fn command_text(&self, keyword: &str) -> String {
        if self.require_prefix {
            format!("#{}", keyword)
        } else {
            keyword.to_string()
        }
    }

    pub(crate) fn menus(&self) -> [(&str, Menu); 7] {
        [
            (self.menu_generate.as_str(), Menu::Generate),
            (self.menu_register.as_str(), Menu::Register),
            (self.menu_list.as_str(), Menu::List),
            (self.menu_settings.as_str(), Menu::Settings),
            (self.menu_usage.as_str(), Menu::Usage),
            (self.menu_mode.as_str(), Menu::Mode),
            (self.menu_font.as_str(), Menu::Font),
        ]
    }
}
