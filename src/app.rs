use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use crate::assistant::{
    ChatAssistant, ChatReply, ComplexAssistant, ErrorPolicy, ImageAssistant, CHAT_APOLOGY,
    IMAGE_APOLOGY,
};
use crate::config::Config;
use crate::gemini::{Transport, TransportError};
use crate::image::ImageAttachment;
use crate::state::Conversation;

/// Opening assistant message shown before the first question.
pub const GREETING: &str = "¡Hola! Soy tu asistente experto en la Sony FX2. ¿Cómo puedo ayudarte hoy con la configuración o el uso de tu cámara? Por ejemplo, puedes preguntar '¿Cómo configuro S-Log3?' o '¿Cuál es la mejor manera de configurar las entradas de audio?'.";

/// Error line for a failed complex consultation.
pub const COMPLEX_ERROR: &str =
    "Ocurrió un error al procesar tu consulta. Por favor, inténtalo de nuevo.";

/// Error line for a failed image analysis (only reachable when the image
/// orchestrator is reconfigured to propagate).
pub const IMAGE_ERROR: &str =
    "Ocurrió un error durante el análisis. Por favor, inténtalo de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Image,
    Complex,
}

impl Mode {
    pub fn title(self) -> &'static str {
        match self {
            Mode::Chat => "Chat con Manual",
            Mode::Image => "Analizador de Imagen",
            Mode::Complex => "Consulta Compleja",
        }
    }

    pub fn all() -> [Mode; 3] {
        [Mode::Chat, Mode::Image, Mode::Complex]
    }

    pub fn next(self) -> Mode {
        match self {
            Mode::Chat => Mode::Image,
            Mode::Image => Mode::Complex,
            Mode::Complex => Mode::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Editing,
}

/// Request lifecycle for one mode: `Idle -> Sending -> Idle`. A submit is
/// only accepted in `Idle`; this field, not any widget-disabled state, is
/// what enforces the single in-flight request per mode, so the guarantee
/// holds for scripted callers too. No cancellation, no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Sending,
}

/// Which input field is active in image mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageField {
    #[default]
    Path,
    Question,
}

pub struct ChatView {
    pub input: String,
    pub cursor: usize,
    pub conversation: Conversation,
    pub phase: Phase,
    pub error: Option<String>,
    pub scroll: u16,
    pub area_height: u16,
    pub area_width: u16,
    pub task: Option<JoinHandle<Result<ChatReply, TransportError>>>,
}

pub struct ImageView {
    pub path_input: String,
    pub path_cursor: usize,
    pub question_input: String,
    pub question_cursor: usize,
    pub field: ImageField,
    pub attachment: Option<ImageAttachment>,
    /// Most recent completed analysis; overwritten on each submission.
    pub response: Option<String>,
    pub error: Option<String>,
    pub phase: Phase,
    pub scroll: u16,
    pub task: Option<JoinHandle<Result<String, TransportError>>>,
}

pub struct ComplexView {
    pub input: String,
    pub cursor: usize,
    /// Most recent completed answer; overwritten on each submission.
    pub response: Option<String>,
    pub error: Option<String>,
    pub phase: Phase,
    pub scroll: u16,
    pub task: Option<JoinHandle<Result<String, TransportError>>>,
}

pub struct App {
    pub should_quit: bool,
    pub mode: Mode,
    pub input_mode: InputMode,
    pub chat: ChatView,
    pub image: ImageView,
    pub complex: ComplexView,

    // Animation state (0-2 for ellipsis animation)
    pub animation_frame: u8,

    chat_assistant: ChatAssistant,
    image_assistant: ImageAssistant,
    complex_assistant: ComplexAssistant,
}

impl App {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let mut conversation = Conversation::new();
        conversation.push_assistant(GREETING, Vec::new());

        Self {
            should_quit: false,
            mode: Mode::Chat,
            input_mode: InputMode::Normal,
            chat: ChatView {
                input: String::new(),
                cursor: 0,
                conversation,
                phase: Phase::Idle,
                error: None,
                scroll: 0,
                area_height: 0,
                area_width: 0,
                task: None,
            },
            image: ImageView {
                path_input: String::new(),
                path_cursor: 0,
                question_input: String::new(),
                question_cursor: 0,
                field: ImageField::Path,
                attachment: None,
                response: None,
                error: None,
                phase: Phase::Idle,
                scroll: 0,
                task: None,
            },
            complex: ComplexView {
                input: String::new(),
                cursor: 0,
                response: None,
                error: None,
                phase: Phase::Idle,
                scroll: 0,
                task: None,
            },
            animation_frame: 0,
            chat_assistant: ChatAssistant::new(
                Arc::clone(&transport),
                config.chat_model(),
                ErrorPolicy::Apologize(CHAT_APOLOGY),
            ),
            image_assistant: ImageAssistant::new(
                Arc::clone(&transport),
                config.chat_model(),
                ErrorPolicy::Apologize(IMAGE_APOLOGY),
            ),
            complex_assistant: ComplexAssistant::new(
                transport,
                config.pro_model(),
                ErrorPolicy::Propagate,
            ),
        }
    }

    /// True while the active mode has a request in flight.
    pub fn is_busy(&self) -> bool {
        let phase = match self.mode {
            Mode::Chat => self.chat.phase,
            Mode::Image => self.image.phase,
            Mode::Complex => self.complex.phase,
        };
        phase == Phase::Sending
    }

    /// Appends the user message and spawns the grounded chat request.
    /// A no-op while a chat request is in flight or the input is empty.
    pub fn submit_chat(&mut self) {
        if self.chat.phase != Phase::Idle || self.chat.input.trim().is_empty() {
            return;
        }

        let question = self.chat.input.trim().to_string();
        self.chat.conversation.push_user(question.clone());
        self.chat.input.clear();
        self.chat.cursor = 0;
        self.chat.error = None;
        self.chat.phase = Phase::Sending;
        self.scroll_chat_to_bottom();

        let assistant = self.chat_assistant.clone();
        self.chat.task = Some(tokio::spawn(
            async move { assistant.ask(&question).await },
        ));
    }

    /// Loads and validates the image named by the path input. Rejections
    /// (size, format) never reach the network; a rejected file leaves any
    /// previously accepted image in place.
    pub fn load_image(&mut self) {
        let path = self.image.path_input.trim().to_string();
        if path.is_empty() {
            return;
        }

        match ImageAttachment::load(std::path::Path::new(&path)) {
            Ok(attachment) => {
                self.image.attachment = Some(attachment);
                self.image.error = None;
                // A new image invalidates the previous analysis
                self.image.response = None;
                self.image.field = ImageField::Question;
            }
            Err(err) => {
                self.image.error = Some(err.to_string());
            }
        }
    }

    /// Spawns the image analysis request. A no-op while one is in flight,
    /// or until both an accepted image and a question are present.
    pub fn submit_image(&mut self) {
        if self.image.phase != Phase::Idle || self.image.question_input.trim().is_empty() {
            return;
        }
        let Some(attachment) = self.image.attachment.clone() else {
            return;
        };

        let question = self.image.question_input.trim().to_string();
        self.image.response = None;
        self.image.error = None;
        self.image.scroll = 0;
        self.image.phase = Phase::Sending;

        let assistant = self.image_assistant.clone();
        self.image.task = Some(tokio::spawn(async move {
            assistant.analyze(&question, &attachment).await
        }));
    }

    /// Spawns the complex consultation. A no-op while one is in flight or
    /// the input is empty.
    pub fn submit_complex(&mut self) {
        if self.complex.phase != Phase::Idle || self.complex.input.trim().is_empty() {
            return;
        }

        let question = self.complex.input.trim().to_string();
        self.complex.response = None;
        self.complex.error = None;
        self.complex.scroll = 0;
        self.complex.phase = Phase::Sending;

        let assistant = self.complex_assistant.clone();
        self.complex.task = Some(tokio::spawn(
            async move { assistant.consult(&question).await },
        ));
    }

    /// Collects finished request tasks and writes their results back into
    /// view state. Called from the event loop; never blocks on an
    /// unfinished task.
    pub async fn poll_responses(&mut self) {
        if let Some(task) = self.chat.task.take_if(|task| task.is_finished()) {
            let outcome = match task.await {
                Ok(result) => result,
                Err(err) => Err(TransportError::Api(format!("background task failed: {err}"))),
            };
            self.complete_chat(outcome);
        }

        if let Some(task) = self.image.task.take_if(|task| task.is_finished()) {
            let outcome = match task.await {
                Ok(result) => result,
                Err(err) => Err(TransportError::Api(format!("background task failed: {err}"))),
            };
            self.complete_image(outcome);
        }

        if let Some(task) = self.complex.task.take_if(|task| task.is_finished()) {
            let outcome = match task.await {
                Ok(result) => result,
                Err(err) => Err(TransportError::Api(format!("background task failed: {err}"))),
            };
            self.complete_complex(outcome);
        }
    }

    fn complete_chat(&mut self, outcome: Result<ChatReply, TransportError>) {
        self.chat.phase = Phase::Idle;
        match outcome {
            Ok(reply) => {
                self.chat.conversation.push_assistant(reply.text, reply.sources);
            }
            // Unreachable under the default degrade-to-message policy
            Err(err) => {
                error!(%err, "chat request surfaced an error");
                self.chat.error = Some(err.to_string());
            }
        }
        self.scroll_chat_to_bottom();
    }

    fn complete_image(&mut self, outcome: Result<String, TransportError>) {
        self.image.phase = Phase::Idle;
        match outcome {
            Ok(text) => {
                self.image.response = Some(text);
                self.image.error = None;
            }
            Err(err) => {
                error!(%err, "image analysis surfaced an error");
                self.image.response = None;
                self.image.error = Some(IMAGE_ERROR.to_string());
            }
        }
    }

    fn complete_complex(&mut self, outcome: Result<String, TransportError>) {
        self.complex.phase = Phase::Idle;
        match outcome {
            Ok(text) => {
                self.complex.response = Some(text);
                self.complex.error = None;
            }
            Err(err) => {
                error!(%err, "complex query failed");
                self.complex.response = None;
                self.complex.error = Some(COMPLEX_ERROR.to_string());
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.phase == Phase::Sending
            || self.image.phase == Phase::Sending
            || self.complex.phase == Phase::Sending
        {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll the transcript so the latest message (or the busy indicator)
    /// is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual area width for wrap calculation, default if not yet drawn
        let wrap_width = if self.chat.area_width > 0 {
            self.chat.area_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.chat.conversation.messages() {
            total_lines += 1; // sender line
            for line in msg.text.lines() {
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            if !msg.sources.is_empty() {
                total_lines += 1 + msg.sources.len() as u16; // "Fuentes:" header + one per source
            }
            total_lines += 1; // blank line after message
        }

        // Busy indicator line
        total_lines += 2;

        let visible_height = if self.chat.area_height > 0 {
            self.chat.area_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat.scroll = total_lines.saturating_sub(visible_height);
        }
    }
}
