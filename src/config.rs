//! Process configuration
//!
//! `AppConfig::from_env` reads deployment settings from the environment.
//! User-facing texts, the command keyword table and the font list come
//! from an optional YAML file (`KASANE_BOT_CONFIG`); every field has a
//! built-in default so the file may override only what it needs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::command::KeywordTable;

// ============================================================================
// Environment
// ============================================================================

/// Which settings / quiz store backend to construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON blobs on local disk
    File {
        settings_path: PathBuf,
        quiz_path: PathBuf,
    },

    /// Process-local, lost on restart
    Memory,

    /// Postgres tables (requires the `database` feature)
    Postgres { url: String },
}

#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    /// The bot's own user id, used to detect mentions of the bot
    pub bot_user_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub line: LineConfig,
    pub server_fqdn: String,
    pub images_dir: PathBuf,
    pub store: StoreBackend,
    pub ffmpeg_bin: String,
    pub video_fps: u32,
    pub port: u16,
    pub bot: BotConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let store = match env_or("STORE_BACKEND", "file").to_ascii_lowercase().as_str() {
            "file" => StoreBackend::File {
                settings_path: env_or("LINE_SETTINGS_FILE_PATH", "data/line_settings.json").into(),
                quiz_path: env_or("LINE_QUIZ_FILE_PATH", "data/line_quiz.json").into(),
            },
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                url: env_or("DATABASE_URL", "postgresql://localhost:5432/kasane"),
            },
            other => bail!("Unknown STORE_BACKEND '{}'", other),
        };

        let bot = match std::env::var("KASANE_BOT_CONFIG") {
            Ok(path) if !path.trim().is_empty() => BotConfig::load_from_file(Path::new(&path))?,
            _ => BotConfig::default(),
        };

        let video_fps = env_or("VIDEO_FPS", "1")
            .parse::<u32>()
            .context("VIDEO_FPS must be a positive integer")?
            .max(1);
        let port = env_or("SERVER_PORT", "8080")
            .parse::<u16>()
            .context("SERVER_PORT must be a port number")?;

        Ok(Self {
            line: LineConfig {
                channel_secret: env_or("LINE_CHANNEL_SECRET", ""),
                channel_access_token: env_or("LINE_CHANNEL_ACCESS_TOKEN", ""),
                bot_user_id: env_or("LINE_BOT_USER_ID", ""),
            },
            server_fqdn: env_or("SERVER_FQDN", ""),
            images_dir: env_or("IMAGES_DIR", "images").into(),
            store,
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            video_fps,
            port,
            bot,
        })
    }
}

// ============================================================================
// YAML bot configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub texts: BotTexts,
    pub keywords: KeywordTable,
    pub fonts: FontConfig,
}

impl BotConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedFont {
    pub key: String,
    pub path: PathBuf,
}

/// Ordered font candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Tried in order; the first loadable file becomes `default`
    pub default_paths: Vec<PathBuf>,
    pub named: Vec<NamedFont>,
    /// Lowercase user-supplied keys before lookup
    pub case_insensitive: bool,
}

const MINCHO_PATH: &str = "/app/.fonts/Honoka_Shin_Mincho_L.otf";
const MONOGOTHIC_PATH: &str = "/app/.fonts/GenEiMonoGothic-Regular.ttf";
const HIRAGINO_PATH: &str = "/System/Library/Fonts/Hiragino Sans GB.ttc";
const DEJAVU_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

impl Default for FontConfig {
    fn default() -> Self {
        let named = [
            ("mincho", MINCHO_PATH),
            ("monogothic", MONOGOTHIC_PATH),
            ("hiragino", HIRAGINO_PATH),
            ("dejavu", DEJAVU_PATH),
        ]
        .into_iter()
        .map(|(key, path)| NamedFont {
            key: key.to_string(),
            path: PathBuf::from(path),
        })
        .collect();
        Self {
            default_paths: [MINCHO_PATH, MONOGOTHIC_PATH, HIRAGINO_PATH, DEJAVU_PATH]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            named,
            case_insensitive: true,
        }
    }
}

/// Every user-facing string. `{name}` placeholders are filled by [`fill`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotTexts {
    pub bot_name: String,
    pub usage: String,
    pub welcome_prefix: String,
    pub generate_prompt: String,
    pub register_help: String,
    pub settings_prompt: String,
    pub mode_prompt: String,
    pub font_prompt: String,
    pub mode_set_common: String,
    pub mode_set_union: String,
    pub font_set: String,
    pub settings_updated: String,
    pub font_invalid_pattern: String,
    pub font_unavailable: String,
    pub invalid_word: String,
    pub invalid_number: String,
    pub not_two_chars: String,
    pub save_failed: String,
    pub generate_failed: String,
    pub load_failed: String,
    pub error_prefix: String,
    pub synth_result: String,
    pub bulk_update_success: String,
    pub bulk_update_failed: String,
    pub quiz_list_title: String,
    pub quiz_unset: String,
    pub quiz_list_footer: String,
    pub quiz_set: String,
    pub quiz_replaced: String,
    pub quiz_dispatch_template: String,
    pub quiz_mode_note: String,
    pub answer_release_format: String,
    pub quiz_format: String,
    pub quiz_prompt_common: String,
    pub quiz_prompt_union: String,
    pub quiz_answer_template: String,
    pub unregistered_template: String,
    pub answer_format: String,
    pub answer_correct: String,
    pub answer_incorrect: String,
    pub answer_template: String,
    pub mention_fallback: String,
    pub mode_label_common: String,
    pub mode_label_union: String,
    pub invalid_signature: String,
    pub bad_request: String,
}

impl Default for BotTexts {
    fn default() -> Self {
        let s = |v: &str| v.to_string();
        Self {
            bot_name: s("文字合成ボット"),
            usage: s("2〜8文字の言葉を送ると、共通部分と和集合の画像を作ります。\n\
                      「1.森林」のように送ると1問目に問題を登録できます。\n\
                      「#一覧」で登録した問題を確認できます。"),
            welcome_prefix: s("友だち追加ありがとうございます！\n"),
            generate_prompt: s("画像にしたい2〜8文字の言葉を送ってください。"),
            register_help: s("「(問題番号).(熟語)」の形式で送ると問題を登録できます。\n例: 1.森林"),
            settings_prompt: s("変更したい設定を選んでください。"),
            mode_prompt: s("出題モードを選んでください。"),
            font_prompt: s("フォントを選んでください。"),
            mode_set_common: s("出題モードを「共通部分」にしました。"),
            mode_set_union: s("出題モードを「和集合」にしました。"),
            font_set: s("フォントを「{font}」に設定しました。"),
            settings_updated: s("設定を更新しました。\nフォント: {font}\n出題モード: {mode}"),
            font_invalid_pattern: s("フォント識別子は2-10文字の英数字で指定してください。"),
            font_unavailable: s("指定されたフォントは利用できません。"),
            invalid_word: s("ひらがな・カタカナ・漢字・英数字のみ使用できます。"),
            invalid_number: s("問題番号は1〜10で指定してください。"),
            not_two_chars: s("2〜8文字の言葉を送ってください。"),
            save_failed: s("設定の保存に失敗しました。"),
            generate_failed: s("画像の生成に失敗しました。"),
            load_failed: s("問題の読み込みに失敗しました。"),
            error_prefix: s("エラー: "),
            synth_result: s("「{word}」の合成結果です。"),
            bulk_update_success: s("問題一覧を更新しました。"),
            bulk_update_failed: s("問題一覧の更新に失敗しました。1〜10問目をすべて正しい形式で送ってください。"),
            quiz_list_title: s("【問題一覧】"),
            quiz_unset: s("未設定"),
            quiz_list_footer: s("グループで「@文字合成ボット (問題番号)」と送ると出題されます。"),
            quiz_set: s("{number}問目に「{word}」をセットしました。"),
            quiz_replaced: s("元の熟語「{old}」を削除しました。"),
            quiz_dispatch_template: s("グループで「@文字合成ボット {number}」と送ると出題されます。"),
            quiz_mode_note: s("共通部分/和集合どちらで出題するかは「#設定」から変更できます。"),
            answer_release_format: s("解答発表は「@文字合成ボット 答え (問題番号)」と送ってください。"),
            quiz_format: s("出題時は「@文字合成ボット (問題番号)」と送ってください。"),
            quiz_prompt_common: s("何の共通部分？"),
            quiz_prompt_union: s("何の和集合？"),
            quiz_answer_template: s("【解答フォーマット】\n@{name} {number}.(解答)"),
            unregistered_template: s("{number}問目は未登録です。"),
            answer_format: s("解答は以下のフォーマットで送信してください。\n@出題者へのメンション (問題番号).(解答)"),
            answer_correct: s("正解"),
            answer_incorrect: s("不正解"),
            answer_template: s("{user}さん、{result}です。"),
            mention_fallback: s("ユーザー"),
            mode_label_common: s("共通部分"),
            mode_label_union: s("和集合"),
            invalid_signature: s("Invalid signature"),
            bad_request: s("Bad Request"),
        }
    }
}

/// Replace each `{key}` in `template` with its value
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template() {
        assert_eq!(
            fill("{number}問目は未登録です。", &[("number", "5")]),
            "5問目は未登録です。"
        );
        assert_eq!(
            fill("{user}さん、{result}です。", &[("result", "正解")]),
            "{user}さん、正解です。"
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
texts:
  answer_correct: "Correct"
keywords:
  require_prefix: false
fonts:
  case_insensitive: false
  default_paths: []
"#;
        let config = BotConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.texts.answer_correct, "Correct");
        assert_eq!(config.texts.answer_incorrect, "不正解");
        assert!(!config.keywords.require_prefix);
        assert!(!config.fonts.case_insensitive);
        assert!(config.fonts.default_paths.is_empty());
        assert_eq!(config.fonts.named.len(), 4);
    }

    #[test]
    fn test_default_font_order() {
        let fonts = FontConfig::default();
        let keys: Vec<_> = fonts.named.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["mincho", "monogothic", "hiragino", "dejavu"]);
        assert_eq!(fonts.default_paths[0], PathBuf::from(MINCHO_PATH));
    }
}
