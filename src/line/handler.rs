//! LINE conversation state machine
//!
//! [`LineHandler`] verifies a webhook delivery, walks its events in order
//! and answers each one with at most one reply. State lives entirely in the
//! settings and quiz stores; the handler itself is stateless and shared
//! across requests.
//!
//! Two flows:
//! - **Direct chat**: menus, settings, quiz registration, the pasted quiz
//!   list, and word compositing.
//! - **Group / room**: only messages with mentions are considered. A bot
//!   mention dispatches a registered quiz or releases its answer; a mention
//!   of exactly one other participant is an answer to that participant's
//!   quiz.
//!
//! Generated files are removed after the reply is sent, whether or not
//! delivery succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::command::{
    parse_bulk_list, parse_quiz_message, plan_bulk_update, BulkListError, Command, CommandParser,
    KeywordTable, Menu, QuizMessage,
};
use crate::config::{fill, BotTexts};
use crate::error::{FontError, KasaneResult};
use crate::generator::{ImageComposer, MediaKind};
use crate::identity::{FontKey, Identity, QuizSlot, Word};
use crate::line::event::{Event, EventMessage, Mentionee, Source, WebhookPayload};
use crate::line::media::MediaStore;
use crate::line::mention::strip_mentions;
use crate::line::messages::{QuickReply, ReplyMessage, USER_PLACEHOLDER};
use crate::line::profile::ProfileLookup;
use crate::line::reply::ReplyClient;
use crate::line::signature::verify_signature;
use crate::store::{QuizMode, QuizStore, SettingsStore, UserSettings};

/// LINE accepts at most 13 quick-reply buttons
const MAX_QUICK_REPLY_ITEMS: usize = 13;

// ============================================================================
// Construction
// ============================================================================

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub channel_secret: String,
    pub bot_user_id: String,
    pub texts: BotTexts,
    pub keywords: KeywordTable,
    pub video_fps: u32,
}

/// Collaborators injected at startup
#[derive(Clone)]
pub struct HandlerDeps {
    pub composer: Arc<dyn ImageComposer>,
    pub settings: Arc<dyn SettingsStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub media: Arc<dyn MediaStore>,
    pub replies: Arc<dyn ReplyClient>,
    pub profiles: Arc<dyn ProfileLookup>,
}

pub struct LineHandler {
    channel_secret: String,
    bot_user_id: String,
    texts: BotTexts,
    parser: CommandParser,
    video_fps: u32,
    composer: Arc<dyn ImageComposer>,
    settings: Arc<dyn SettingsStore>,
    quizzes: Arc<dyn QuizStore>,
    media: Arc<dyn MediaStore>,
    replies: Arc<dyn ReplyClient>,
    profiles: Arc<dyn ProfileLookup>,
}

/// Transport-level outcome of one webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status: u16,
    pub body: String,
}

/// Reply for one event plus the local files to remove once it is sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outgoing {
    pub messages: Vec<ReplyMessage>,
    pub cleanup: Vec<PathBuf>,
}

impl Outgoing {
    fn none() -> Self {
        Self::default()
    }

    fn message(message: ReplyMessage) -> Self {
        Self {
            messages: vec![message],
            cleanup: Vec::new(),
        }
    }

    fn text(text: impl Into<String>) -> Self {
        Self::message(ReplyMessage::text(text))
    }
}

impl LineHandler {
    pub fn new(config: HandlerConfig, deps: HandlerDeps) -> Self {
        Self {
            channel_secret: config.channel_secret,
            bot_user_id: config.bot_user_id,
            texts: config.texts,
            parser: CommandParser::new(config.keywords),
            video_fps: config.video_fps.max(1),
            composer: deps.composer,
            settings: deps.settings,
            quizzes: deps.quizzes,
            media: deps.media,
            replies: deps.replies,
            profiles: deps.profiles,
        }
    }

    pub fn composer(&self) -> &Arc<dyn ImageComposer> {
        &self.composer
    }

    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }

    // ========================================================================
    // Webhook entry
    // ========================================================================

    /// Verify, decode and process one delivery.
    ///
    /// 403 on a bad signature and 400 on an undecodable body, before any
    /// event runs. Otherwise 200, even if some replies failed to deliver.
    pub async fn handle_callback(&self, body: &[u8], signature: &str) -> CallbackResponse {
        if let Err(e) = verify_signature(&self.channel_secret, body, signature) {
            warn!("Rejected webhook: {}", e);
            return CallbackResponse {
                status: 403,
                body: self.texts.invalid_signature.clone(),
            };
        }

        let payload = match WebhookPayload::from_body(body) {
            Ok(payload) => payload,
            Err(e) => {
                error!("LINE webhook rejected: {}", e);
                return CallbackResponse {
                    status: 400,
                    body: self.texts.bad_request.clone(),
                };
            }
        };

        debug!("Webhook delivery with {} events", payload.events.len());
        for event in &payload.events {
            self.handle_event(event).await;
        }

        CallbackResponse {
            status: 200,
            body: "OK".to_string(),
        }
    }

    /// Answer one event, then remove whatever files the answer produced
    pub async fn handle_event(&self, event: &Event) {
        let Some(reply_token) = event.reply_token.as_deref().filter(|t| !t.is_empty()) else {
            return;
        };

        let outgoing = self.respond(event).await;
        if !outgoing.messages.is_empty() {
            if let Err(e) = self.replies.reply(reply_token, &outgoing.messages).await {
                error!("LINE reply failed: {}", e);
            }
        }
        if !outgoing.cleanup.is_empty() {
            self.media.cleanup(&outgoing.cleanup).await;
        }
    }

    /// Decide the reply for one event without sending it
    pub async fn respond(&self, event: &Event) -> Outgoing {
        match event.kind.as_str() {
            "follow" => {
                let welcome = format!("{}{}", self.texts.welcome_prefix, self.texts.usage);
                Outgoing::message(ReplyMessage::text_with_quick_reply(
                    welcome,
                    self.main_quick_reply(),
                ))
            }
            "message" => match &event.message {
                Some(message) if message.kind == "text" => {
                    if event.source.is_multi_party() {
                        self.respond_in_group(&event.source, message).await
                    } else {
                        self.respond_in_chat(&event.source, &message.text).await
                    }
                }
                _ => Outgoing::none(),
            },
            _ => Outgoing::none(),
        }
    }

    // ========================================================================
    // Direct chat
    // ========================================================================

    async fn respond_in_chat(&self, source: &Source, text: &str) -> Outgoing {
        let identity = source.identity();

        if let Some(parsed) = parse_bulk_list(
            text,
            &self.texts.quiz_list_title,
            &self.texts.quiz_list_footer,
        ) {
            return self.apply_bulk_list(&identity, parsed).await;
        }

        let command = self.parser.parse(text);
        match &command {
            Command::Help | Command::Menu(Menu::Usage) => {
                return Outgoing::message(ReplyMessage::text_with_quick_reply(
                    self.texts.usage.clone(),
                    self.main_quick_reply(),
                ))
            }
            Command::Menu(menu) => return self.respond_to_menu(source, &identity, *menu).await,
            Command::List => return self.quiz_list_reply(source, &identity).await,
            Command::ModeCommon => return self.set_mode(&identity, QuizMode::Intersection).await,
            Command::ModeUnion => return self.set_mode(&identity, QuizMode::Union).await,
            Command::Font { value } => return self.set_font(&identity, value).await,
            Command::InvalidWord => return Outgoing::text(self.texts.invalid_word.clone()),
            _ => {}
        }

        if let Some(quiz) = parse_quiz_message(text) {
            return self.register_quiz(&identity, quiz).await;
        }

        match command {
            Command::Both { word } => {
                let settings = self.load_settings(&identity).await;
                let font = self.effective_font(&settings);
                self.compose_reply(&word, &font).await
            }
            Command::Setting { key, value } => self.apply_setting(&identity, &key, &value).await,
            _ => Outgoing::text(self.texts.not_two_chars.clone()),
        }
    }

    async fn respond_to_menu(&self, source: &Source, identity: &Identity, menu: Menu) -> Outgoing {
        let texts = &self.texts;
        let message = match menu {
            Menu::Generate => ReplyMessage::text(texts.generate_prompt.clone()),
            Menu::Register => ReplyMessage::text(texts.register_help.clone()),
            Menu::List => return self.quiz_list_reply(source, identity).await,
            Menu::Settings => ReplyMessage::text_with_quick_reply(
                texts.settings_prompt.clone(),
                self.settings_quick_reply(),
            ),
            Menu::Usage => {
                ReplyMessage::text_with_quick_reply(texts.usage.clone(), self.main_quick_reply())
            }
            Menu::Mode => ReplyMessage::text_with_quick_reply(
                texts.mode_prompt.clone(),
                self.mode_quick_reply(),
            ),
            Menu::Font => ReplyMessage::text_with_quick_reply(
                texts.font_prompt.clone(),
                self.font_quick_reply(),
            ),
        };
        Outgoing::message(message)
    }

    async fn quiz_list_reply(&self, source: &Source, identity: &Identity) -> Outgoing {
        // The list only makes sense in a one-to-one chat
        if source.is_multi_party() {
            return Outgoing::none();
        }
        match self.quizzes.list_words(identity).await {
            Ok(items) => {
                let mut lines = vec![self.texts.quiz_list_title.clone()];
                for slot in QuizSlot::all() {
                    let word = items
                        .get(&slot)
                        .map(|item| item.word.as_str())
                        .unwrap_or(&self.texts.quiz_unset);
                    lines.push(format!("{}. {}", slot, word));
                }
                lines.push(self.texts.quiz_list_footer.clone());
                Outgoing::text(lines.join("\n"))
            }
            Err(e) => {
                error!("Quiz list failed for {}: {}", identity, e);
                Outgoing::text(self.error_text(&self.texts.load_failed))
            }
        }
    }

    async fn apply_bulk_list(
        &self,
        identity: &Identity,
        parsed: Result<BTreeMap<QuizSlot, String>, BulkListError>,
    ) -> Outgoing {
        let planned =
            parsed.and_then(|entries| plan_bulk_update(&entries, &self.texts.quiz_unset));
        let writes = match planned {
            Ok(writes) => writes,
            Err(e) => {
                info!("Bulk quiz list rejected for {}: {}", identity, e);
                return Outgoing::text(self.texts.bulk_update_failed.clone());
            }
        };

        let mode = self.load_settings(identity).await.quiz_mode;
        match self.quizzes.replace_all(identity, &writes, Some(mode)).await {
            Ok(()) => {
                info!("Bulk quiz list applied for {}", identity);
                Outgoing::text(self.texts.bulk_update_success.clone())
            }
            Err(e) => {
                error!("Bulk quiz update failed for {}: {}", identity, e);
                Outgoing::text(self.texts.bulk_update_failed.clone())
            }
        }
    }

    async fn register_quiz(&self, identity: &Identity, quiz: QuizMessage) -> Outgoing {
        let (slot, word) = match quiz {
            QuizMessage::InvalidNumber => return Outgoing::text(self.texts.invalid_number.clone()),
            QuizMessage::InvalidLength { .. } => {
                return Outgoing::text(self.texts.not_two_chars.clone())
            }
            QuizMessage::InvalidWord { .. } => {
                return Outgoing::text(self.texts.invalid_word.clone())
            }
            QuizMessage::Ok { slot, word } => (slot, word),
        };

        let mode = self.load_settings(identity).await.quiz_mode;
        match self.quizzes.set_word(identity, slot, &word, Some(mode)).await {
            Ok(previous) => {
                info!("Registered quiz {} for {}: {}", slot, identity, word);
                Outgoing::text(self.registration_text(slot, &word, previous.as_ref()))
            }
            Err(e) => {
                error!(
                    "Quiz registration failed for {} slot {} word {}: {}",
                    identity, slot, word, e
                );
                Outgoing::text(self.error_text(&self.texts.save_failed))
            }
        }
    }

    fn registration_text(&self, slot: QuizSlot, word: &Word, previous: Option<&Word>) -> String {
        let number = slot.to_string();
        let texts = &self.texts;
        let mut head = fill(
            &texts.quiz_set,
            &[("number", number.as_str()), ("word", word.as_str())],
        );
        if let Some(old) = previous {
            head.push_str(&fill(&texts.quiz_replaced, &[("old", old.as_str())]));
        }
        let dispatch = fill(&texts.quiz_dispatch_template, &[("number", number.as_str())]);
        [
            head,
            dispatch,
            texts.answer_release_format.clone(),
            texts.quiz_mode_note.clone(),
        ]
        .join("\n")
    }

    async fn set_mode(&self, identity: &Identity, mode: QuizMode) -> Outgoing {
        let ack = match mode {
            QuizMode::Intersection => self.texts.mode_set_common.clone(),
            QuizMode::Union => self.texts.mode_set_union.clone(),
        };
        match self
            .settings
            .update_settings(identity, Box::new(move |s| s.quiz_mode = mode))
            .await
        {
            Ok(_) => Outgoing::text(ack),
            Err(e) => {
                error!("Saving quiz mode {} for {} failed: {}", mode, identity, e);
                Outgoing::text(self.texts.save_failed.clone())
            }
        }
    }

    async fn set_font(&self, identity: &Identity, value: &str) -> Outgoing {
        let font = match self.composer.normalize_font(Some(value)) {
            Ok(font) => font,
            Err(e) => return Outgoing::text(self.font_error_text(&e)),
        };
        let stored = font.clone();
        match self
            .settings
            .update_settings(identity, Box::new(move |s| s.font = stored))
            .await
        {
            Ok(_) => Outgoing::message(ReplyMessage::text_with_quick_reply(
                fill(&self.texts.font_set, &[("font", font.as_str())]),
                self.main_quick_reply(),
            )),
            Err(e) => {
                error!("Saving font {} for {} failed: {}", font, identity, e);
                Outgoing::text(self.texts.save_failed.clone())
            }
        }
    }

    /// `font=<key>` and `mode=<intersection|union>`; other keys leave settings as they are
    async fn apply_setting(&self, identity: &Identity, key: &str, value: &str) -> Outgoing {
        let mut font = None;
        let mut mode = None;
        match key {
            "font" => match self.composer.normalize_font(Some(value)) {
                Ok(key) => font = Some(key),
                Err(e) => return Outgoing::text(self.font_error_text(&e)),
            },
            "mode" => match value.parse::<QuizMode>() {
                Ok(parsed) => mode = Some(parsed),
                Err(_) => {
                    return Outgoing::message(ReplyMessage::text_with_quick_reply(
                        self.texts.mode_prompt.clone(),
                        self.mode_quick_reply(),
                    ))
                }
            },
            other => debug!("Ignoring unknown setting key '{}'", other),
        }

        let result = self
            .settings
            .update_settings(
                identity,
                Box::new(move |s| {
                    if let Some(font) = font {
                        s.font = font;
                    }
                    if let Some(mode) = mode {
                        s.quiz_mode = mode;
                    }
                }),
            )
            .await;
        match result {
            Ok(settings) => Outgoing::message(ReplyMessage::text_with_quick_reply(
                fill(
                    &self.texts.settings_updated,
                    &[
                        ("font", settings.font.as_str()),
                        ("mode", self.mode_label(settings.quiz_mode)),
                    ],
                ),
                self.main_quick_reply(),
            )),
            Err(e) => {
                error!("Saving settings for {} failed: {}", identity, e);
                Outgoing::text(self.texts.save_failed.clone())
            }
        }
    }

    // ========================================================================
    // Compositing replies
    // ========================================================================

    /// Label, question and union images, then the answer image (two
    /// characters) or the reveal video (three or more)
    async fn compose_reply(&self, word: &Word, font: &FontKey) -> Outgoing {
        let mut cleanup = Vec::new();
        let messages = match self.compose_messages(word, font, &mut cleanup).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("LINE image generate error for {} font {}: {}", word, font, e);
                vec![ReplyMessage::text(self.error_text(&self.texts.generate_failed))]
            }
        };
        Outgoing { messages, cleanup }
    }

    async fn compose_messages(
        &self,
        word: &Word,
        font: &FontKey,
        cleanup: &mut Vec<PathBuf>,
    ) -> KasaneResult<Vec<ReplyMessage>> {
        let images = self.composer.generate_images(word, font).await?;
        cleanup.extend(images.paths());

        let mut messages = vec![
            ReplyMessage::text(fill(&self.texts.synth_result, &[("word", word.as_str())])),
            ReplyMessage::image(self.url(MediaKind::Question, word, font, &images.question)?),
            ReplyMessage::image(self.url(MediaKind::Union, word, font, &images.union)?),
        ];

        if word.char_count() >= 3 {
            let video = self.composer.generate_video(word, font, self.video_fps).await?;
            cleanup.extend(video.paths());
            messages.push(ReplyMessage::video(
                self.url(MediaKind::Video, word, font, &video.video)?,
                self.url(MediaKind::Preview, word, font, &video.preview)?,
            ));
        } else if let Some(answer) = &images.answer {
            messages.push(ReplyMessage::image(self.url(MediaKind::Answer, word, font, answer)?));
        }
        Ok(messages)
    }

    fn url(
        &self,
        kind: MediaKind,
        word: &Word,
        font: &FontKey,
        path: &Path,
    ) -> KasaneResult<String> {
        Ok(self.media.url_for(kind, word, font, path)?)
    }

    // ========================================================================
    // Group / room
    // ========================================================================

    async fn respond_in_group(&self, source: &Source, message: &EventMessage) -> Outgoing {
        let mentionees = message.mentionees();
        if mentionees.is_empty() {
            return Outgoing::none();
        }

        let remaining = strip_mentions(&message.text, mentionees);
        let tokens: Vec<&str> = remaining.split_whitespace().collect();
        let command_tokens = match tokens.split_first() {
            Some((first, rest)) if first.starts_with('@') => rest,
            _ => tokens.as_slice(),
        };
        let command_text = command_tokens.join(" ");
        let last_token = tokens.last().copied().unwrap_or_default();

        let sender_id = source.user_id();
        let sender = sender_id.map(Identity::user).unwrap_or_else(|| source.identity());

        if mentionees.iter().any(|m| self.is_bot(m)) {
            let answer_keyword = &self.parser.keywords().answer_keyword;
            if !answer_keyword.is_empty() {
                if let Some(rest) = command_text.strip_prefix(answer_keyword.as_str()) {
                    return self.release_answer(&sender, rest).await;
                }
            }
            let number_text = if command_text.is_empty() {
                last_token
            } else {
                command_text.as_str()
            };
            return self.dispatch_quiz(source, &sender, number_text).await;
        }

        match mentionees {
            [target] => match target.user_id() {
                Some(target_id) => {
                    self.check_answer(source, Identity::user(target_id), &command_text)
                        .await
                }
                None => Outgoing::none(),
            },
            _ => Outgoing::none(),
        }
    }

    fn is_bot(&self, mentionee: &Mentionee) -> bool {
        mentionee.is_self
            || (!self.bot_user_id.is_empty()
                && mentionee.user_id() == Some(self.bot_user_id.as_str()))
    }

    /// `@bot <n>`: show slot n of the sender's quizzes in the sender's quiz mode
    async fn dispatch_quiz(
        &self,
        source: &Source,
        sender: &Identity,
        number_text: &str,
    ) -> Outgoing {
        let Ok(slot) = QuizSlot::parse(number_text) else {
            return Outgoing::text(self.texts.quiz_format.clone());
        };
        let item = match self.quizzes.get_word(sender, slot).await {
            Ok(Some(item)) => item,
            Ok(None) => return Outgoing::text(self.unregistered_text(slot)),
            Err(e) => {
                error!("Quiz lookup failed for {} slot {}: {}", sender, slot, e);
                return Outgoing::text(self.error_text(&self.texts.load_failed));
            }
        };

        let settings = self.load_settings(sender).await;
        let font = self.effective_font(&settings);
        let name = self.display_name(source).await;
        let answer_text = fill(
            &self.texts.quiz_answer_template,
            &[("name", name.as_str()), ("number", slot.to_string().as_str())],
        );

        let word = &item.word;
        let images = match self.composer.generate_images(word, &font).await {
            Ok(images) => images,
            Err(e) => {
                error!("LINE group quiz generate error for {}: {}", word, e);
                return Outgoing::text(self.error_text(&self.texts.generate_failed));
            }
        };
        let (prompt, kind, path) = match settings.quiz_mode {
            QuizMode::Union => (&self.texts.quiz_prompt_union, MediaKind::Union, &images.union),
            QuizMode::Intersection => (
                &self.texts.quiz_prompt_common,
                MediaKind::Question,
                &images.question,
            ),
        };
        let messages = match self.url(kind, word, &font, path) {
            Ok(url) => vec![
                ReplyMessage::text(prompt.clone()),
                ReplyMessage::image(url),
                ReplyMessage::text(answer_text),
            ],
            Err(e) => {
                error!("Media URL failed for {}: {}", word, e);
                vec![ReplyMessage::text(self.error_text(&self.texts.generate_failed))]
            }
        };
        info!("Dispatched quiz {} of {} ({})", slot, sender, settings.quiz_mode);
        Outgoing {
            messages,
            cleanup: images.paths(),
        }
    }

    /// `@bot 答え <n>`: full answer regardless of quiz mode
    async fn release_answer(&self, sender: &Identity, rest: &str) -> Outgoing {
        let Ok(slot) = QuizSlot::parse(rest.trim()) else {
            return Outgoing::text(self.texts.answer_release_format.clone());
        };
        let item = match self.quizzes.get_word(sender, slot).await {
            Ok(Some(item)) => item,
            Ok(None) => return Outgoing::text(self.unregistered_text(slot)),
            Err(e) => {
                error!("Quiz lookup failed for {} slot {}: {}", sender, slot, e);
                return Outgoing::text(self.error_text(&self.texts.load_failed));
            }
        };

        let settings = self.load_settings(sender).await;
        let font = self.effective_font(&settings);
        let mut cleanup = Vec::new();
        let result = self.answer_messages(&item.word, &font, &mut cleanup).await;
        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                error!("LINE answer release error for {}: {}", item.word, e);
                vec![ReplyMessage::text(self.error_text(&self.texts.generate_failed))]
            }
        };
        Outgoing { messages, cleanup }
    }

    async fn answer_messages(
        &self,
        word: &Word,
        font: &FontKey,
        cleanup: &mut Vec<PathBuf>,
    ) -> KasaneResult<Vec<ReplyMessage>> {
        if word.char_count() >= 3 {
            let video = self.composer.generate_video(word, font, self.video_fps).await?;
            cleanup.extend(video.paths());
            return Ok(vec![ReplyMessage::video(
                self.url(MediaKind::Video, word, font, &video.video)?,
                self.url(MediaKind::Preview, word, font, &video.preview)?,
            )]);
        }
        let images = self.composer.generate_images(word, font).await?;
        cleanup.extend(images.paths());
        let answer = images.answer.as_deref().unwrap_or(images.question.as_path());
        Ok(vec![ReplyMessage::image(self.url(MediaKind::Answer, word, font, answer)?)])
    }

    /// `@owner <n>.<word>`: compare against the mentioned owner's slot n
    async fn check_answer(&self, source: &Source, owner: Identity, payload: &str) -> Outgoing {
        let (slot, word) = match parse_quiz_message(payload) {
            Some(QuizMessage::Ok { slot, word }) => (slot, word),
            Some(QuizMessage::InvalidWord { .. }) => {
                let template = format!("{} {}", USER_PLACEHOLDER, self.texts.invalid_word);
                return Outgoing::message(self.mention_reply(source, template).await);
            }
            _ => return Outgoing::text(self.texts.answer_format.clone()),
        };

        let stored = match self.quizzes.get_word(&owner, slot).await {
            Ok(Some(item)) => item.word,
            Ok(None) => {
                let template = format!("{} {}", USER_PLACEHOLDER, self.unregistered_text(slot));
                return Outgoing::message(self.mention_reply(source, template).await);
            }
            Err(e) => {
                error!("Quiz lookup failed for {} slot {}: {}", owner, slot, e);
                return Outgoing::text(self.error_text(&self.texts.load_failed));
            }
        };

        let result = if stored == word {
            &self.texts.answer_correct
        } else {
            &self.texts.answer_incorrect
        };
        debug!("Answer for {} slot {}: {}", owner, slot, result);
        let template = fill(&self.texts.answer_template, &[("result", result.as_str())]);
        Outgoing::message(self.mention_reply(source, template).await)
    }

    async fn mention_reply(&self, source: &Source, template: String) -> ReplyMessage {
        ReplyMessage::Mention {
            template,
            user_id: source.user_id().map(str::to_string),
            display_name: self.display_name(source).await,
        }
    }

    /// Sender's display name, or the configured fallback
    async fn display_name(&self, source: &Source) -> String {
        let name = match source.user_id() {
            Some(user_id) => self.profiles.display_name(source, user_id).await,
            None => String::new(),
        };
        if name.is_empty() {
            self.texts.mention_fallback.clone()
        } else {
            name
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load_settings(&self, identity: &Identity) -> UserSettings {
        match self.settings.load_settings(identity).await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Loading settings for {} failed: {}", identity, e);
                UserSettings::default()
            }
        }
    }

    /// Stored font if it is still available, else `default`
    fn effective_font(&self, settings: &UserSettings) -> FontKey {
        match self.composer.normalize_font(Some(settings.font.as_str())) {
            Ok(font) => font,
            Err(e) => {
                warn!("Stored font unusable, falling back to default: {}", e);
                FontKey::default_key()
            }
        }
    }

    fn font_error_text(&self, error: &FontError) -> String {
        match error {
            FontError::Pattern(_) => self.texts.font_invalid_pattern.clone(),
            FontError::Unavailable(_) => self.texts.font_unavailable.clone(),
        }
    }

    fn unregistered_text(&self, slot: QuizSlot) -> String {
        fill(
            &self.texts.unregistered_template,
            &[("number", slot.to_string().as_str())],
        )
    }

    fn error_text(&self, message: &str) -> String {
        format!("{}{}", self.texts.error_prefix, message)
    }

    fn mode_label(&self, mode: QuizMode) -> &str {
        match mode {
            QuizMode::Intersection => &self.texts.mode_label_common,
            QuizMode::Union => &self.texts.mode_label_union,
        }
    }

    // ========================================================================
    // Quick replies
    // ========================================================================

    fn keyword_buttons<'a>(&self, keywords: impl IntoIterator<Item = &'a str>) -> QuickReply {
        let table = self.parser.keywords();
        QuickReply::new(
            keywords
                .into_iter()
                .filter(|k| !k.is_empty())
                .map(|k| (k.to_string(), table.command_text(k))),
        )
    }

    fn main_quick_reply(&self) -> QuickReply {
        let kw = self.parser.keywords();
        self.keyword_buttons([
            kw.menu_generate.as_str(),
            kw.menu_register.as_str(),
            kw.menu_list.as_str(),
            kw.menu_settings.as_str(),
            kw.menu_usage.as_str(),
        ])
    }

    fn settings_quick_reply(&self) -> QuickReply {
        let kw = self.parser.keywords();
        self.keyword_buttons([kw.menu_mode.as_str(), kw.menu_font.as_str()])
    }

    fn mode_quick_reply(&self) -> QuickReply {
        let kw = self.parser.keywords();
        QuickReply::new(
            [
                (&self.texts.mode_label_common, &kw.mode_common),
                (&self.texts.mode_label_union, &kw.mode_union),
            ]
            .into_iter()
            .filter(|(_, keyword)| !keyword.is_empty())
            .map(|(label, keyword)| (label.clone(), kw.command_text(keyword))),
        )
    }

    fn font_quick_reply(&self) -> QuickReply {
        let kw = self.parser.keywords();
        QuickReply::new(
            self.composer
                .font_keys()
                .into_iter()
                .take(MAX_QUICK_REPLY_ITEMS)
                .map(|key| {
                    let text = if kw.font_prefix.is_empty() {
                        kw.command_text(&format!("{} {}", kw.font, key))
                    } else {
                        format!("{}{}", kw.font_prefix, key)
                    };
                    (key, text)
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::{DeliveryError, StoreError, StoreResult};
    use crate::generator::{GeneratedImages, GeneratedVideo};
    use crate::store::{MemoryStore, QuizItem, SlotWrite};

    struct NoopComposer;

    #[async_trait]
    impl ImageComposer for NoopComposer {
        fn normalize_font(&self, raw: Option<&str>) -> Result<FontKey, FontError> {
            match raw.map(str::trim).unwrap_or_default() {
                "" | "default" => Ok(FontKey::default_key()),
                "mincho" => Ok(FontKey::from_registered("mincho")),
                other if other.chars().all(|c| c.is_ascii_alphanumeric()) && other.len() >= 2 => {
                    Err(FontError::Unavailable(other.to_string()))
                }
                other => Err(FontError::Pattern(other.to_string())),
            }
        }

        fn font_keys(&self) -> Vec<String> {
            vec!["default".to_string(), "mincho".to_string()]
        }

        fn media_path(&self, kind: MediaKind, word: &Word, font: &FontKey) -> PathBuf {
            PathBuf::from(kind.file_name(word, font))
        }

        async fn generate_images(
            &self,
            word: &Word,
            font: &FontKey,
        ) -> KasaneResult<GeneratedImages> {
            let answer = (word.char_count() == 2)
                .then(|| self.media_path(MediaKind::Answer, word, font));
            Ok(GeneratedImages {
                question: self.media_path(MediaKind::Question, word, font),
                answer,
                union: self.media_path(MediaKind::Union, word, font),
            })
        }

        async fn generate_video(
            &self,
            word: &Word,
            font: &FontKey,
            _fps: u32,
        ) -> KasaneResult<GeneratedVideo> {
            Ok(GeneratedVideo {
                video: self.media_path(MediaKind::Video, word, font),
                preview: self.media_path(MediaKind::Preview, word, font),
            })
        }
    }

    struct NoopMedia;

    #[async_trait]
    impl MediaStore for NoopMedia {
        fn url_for(
            &self,
            kind: MediaKind,
            word: &Word,
            _font: &FontKey,
            _path: &Path,
        ) -> Result<String, DeliveryError> {
            Ok(format!("https://media/{}/{}", kind.route(), word))
        }

        async fn cleanup(&self, _paths: &[PathBuf]) {}
    }

    struct NoopReplies;

    #[async_trait]
    impl ReplyClient for NoopReplies {
        async fn reply(
            &self,
            _token: &str,
            _messages: &[ReplyMessage],
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    struct NoProfiles;

    #[async_trait]
    impl ProfileLookup for NoProfiles {
        async fn display_name(&self, _source: &Source, _user_id: &str) -> String {
            String::new()
        }
    }

    /// Every read fails
    struct UnreadableQuizzes;

    #[async_trait]
    impl QuizStore for UnreadableQuizzes {
        async fn get_word(
            &self,
            _owner: &Identity,
            _slot: QuizSlot,
        ) -> StoreResult<Option<QuizItem>> {
            Err(StoreError::InvalidRecord("unreadable".to_string()))
        }

        async fn set_word(
            &self,
            _owner: &Identity,
            _slot: QuizSlot,
            _word: &Word,
            _quiz_mode: Option<QuizMode>,
        ) -> StoreResult<Option<Word>> {
            Ok(None)
        }

        async fn delete_word(
            &self,
            _owner: &Identity,
            _slot: QuizSlot,
        ) -> StoreResult<Option<Word>> {
            Ok(None)
        }

        async fn list_words(&self, _owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
            Err(StoreError::InvalidRecord("unreadable".to_string()))
        }

        async fn replace_all(
            &self,
            _owner: &Identity,
            _writes: &[SlotWrite],
            _quiz_mode: Option<QuizMode>,
        ) -> StoreResult<()> {
            Ok(())
        }
    }

    fn handler(store: MemoryStore) -> LineHandler {
        handler_with_quizzes(store.clone(), Arc::new(store))
    }

    fn handler_with_quizzes(store: MemoryStore, quizzes: Arc<dyn QuizStore>) -> LineHandler {
        LineHandler::new(
            HandlerConfig {
                channel_secret: "secret".to_string(),
                bot_user_id: "Ubot".to_string(),
                texts: BotTexts::default(),
                keywords: KeywordTable::default(),
                video_fps: 1,
            },
            HandlerDeps {
                composer: Arc::new(NoopComposer),
                settings: Arc::new(store),
                quizzes,
                media: Arc::new(NoopMedia),
                replies: Arc::new(NoopReplies),
                profiles: Arc::new(NoProfiles),
            },
        )
    }

    fn user() -> Source {
        Source {
            kind: "user".to_string(),
            user_id: Some("U1".to_string()),
            ..Source::default()
        }
    }

    fn texts_of(outgoing: &Outgoing) -> Vec<String> {
        outgoing
            .messages
            .iter()
            .filter_map(ReplyMessage::rendered_text)
            .collect()
    }

    #[tokio::test]
    async fn test_three_char_word_gets_video() {
        let handler = handler(MemoryStore::default());
        let outgoing = handler.respond_in_chat(&user(), "音楽性").await;
        assert_eq!(outgoing.messages.len(), 4);
        assert!(matches!(outgoing.messages[3], ReplyMessage::Video { .. }));
        assert_eq!(outgoing.cleanup.len(), 4);
    }

    #[tokio::test]
    async fn test_font_command_validates_and_persists() {
        let store = MemoryStore::default();
        let handler = handler(store.clone());

        let outgoing = handler.respond_in_chat(&user(), "#フォント x!").await;
        assert_eq!(texts_of(&outgoing), [BotTexts::default().font_invalid_pattern]);

        let outgoing = handler.respond_in_chat(&user(), "font_gothic").await;
        assert_eq!(texts_of(&outgoing), [BotTexts::default().font_unavailable]);

        let outgoing = handler.respond_in_chat(&user(), "font_mincho").await;
        assert_eq!(texts_of(&outgoing), ["フォントを「mincho」に設定しました。"]);
        let settings = store.load_settings(&Identity::user("U1")).await.unwrap();
        assert_eq!(settings.font.as_str(), "mincho");
    }

    #[tokio::test]
    async fn test_setting_command_updates_mode() {
        let store = MemoryStore::default();
        let handler = handler(store.clone());
        let outgoing = handler.respond_in_chat(&user(), "#設定 mode=union").await;
        assert_eq!(
            texts_of(&outgoing),
            ["設定を更新しました。\nフォント: default\n出題モード: 和集合"]
        );
        let settings = store.load_settings(&Identity::user("U1")).await.unwrap();
        assert_eq!(settings.quiz_mode, QuizMode::Union);
    }

    #[tokio::test]
    async fn test_list_after_registration() {
        let handler = handler(MemoryStore::default());
        handler.respond_in_chat(&user(), "1.森林").await;
        let outgoing = handler.respond_in_chat(&user(), "#一覧").await;
        let text = texts_of(&outgoing).remove(0);
        assert!(text.starts_with("【問題一覧】\n1. 森林\n2. 未設定"));
        assert!(text.ends_with(&BotTexts::default().quiz_list_footer));
    }

    #[tokio::test]
    async fn test_read_failures_report_load_error() {
        let handler = handler_with_quizzes(MemoryStore::default(), Arc::new(UnreadableQuizzes));
        let texts = BotTexts::default();
        let expected = format!("{}{}", texts.error_prefix, texts.load_failed);

        let outgoing = handler.respond_in_chat(&user(), "#一覧").await;
        assert_eq!(texts_of(&outgoing), [expected.clone()]);

        let group = Source {
            kind: "group".to_string(),
            group_id: Some("G1".to_string()),
            user_id: Some("U1".to_string()),
            ..Source::default()
        };
        let outgoing = handler.dispatch_quiz(&group, &Identity::user("U1"), "3").await;
        assert_eq!(texts_of(&outgoing), [expected]);
    }

    #[tokio::test]
    async fn test_unknown_input_gets_length_notice() {
        let handler = handler(MemoryStore::default());
        let outgoing = handler.respond_in_chat(&user(), "あ").await;
        assert_eq!(texts_of(&outgoing), [BotTexts::default().not_two_chars]);
    }

    #[tokio::test]
    async fn test_registration_reports_format_hints() {
        let handler = handler(MemoryStore::default());
        let text = texts_of(&handler.respond_in_chat(&user(), "3.森林").await).remove(0);
        assert!(text.starts_with("3問目に「森林」をセットしました。\n"));
        assert!(text.contains("グループで「@文字合成ボット 3」と送ると出題されます。"));
    }

    #[test]
    fn test_font_quick_reply_uses_prefix_payloads() {
        let handler = handler(MemoryStore::default());
        let quick = handler.font_quick_reply();
        assert_eq!(quick.items[1].text, "font_mincho");
        let main = handler.main_quick_reply();
        assert_eq!(main.items[0].text, "#画像生成");
    }
}
