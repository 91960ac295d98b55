//! The three request orchestrators and their persona instructions.
//!
//! Each orchestrator validates nothing itself (local input checks belong to
//! the calling view), assembles one request from its fixed persona plus the
//! user content, sends it through the injected transport, and shapes the
//! result for display according to its [`ErrorPolicy`].

use std::sync::Arc;

use tracing::error;

use crate::gemini::{GroundingChunk, Part, Request, RequestOptions, Transport, TransportError};
use crate::image::ImageAttachment;
use crate::state::Source;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";

/// Provider-side deliberation allowance for complex consultations.
pub const COMPLEX_REASONING_BUDGET: u32 = 32_768;

const CHAT_INSTRUCTION: &str = "Eres un experto de clase mundial en la cámara Sony FX2. Tu misión es responder a las preguntas de los usuarios con extrema precisión, extrayendo información de sus manuales oficiales y fuentes confiables en línea. Proporciona instrucciones claras, concisas y paso a paso. Al referirte a un botón, dial o elemento del menú de la cámara, especifica su nombre exacto y ubicación (por ejemplo, 'el botón de obturador en la parte superior derecha', 'Menú > Disparo > Calidad de Imagen'). Formatea tus respuestas usando markdown para mayor claridad, especialmente para listas y pasos. Tu respuesta debe abordar directamente la pregunta del usuario sobre la configuración o el uso.";

const IMAGE_INSTRUCTION: &str = "Eres un experto en la cámara Sony FX2. Analiza la imagen proporcionada, que podría ser una captura de pantalla de un menú, una foto de un botón o una escena. Basado en la pregunta del usuario, explica qué se muestra y cómo se relaciona con la funcionalidad de la Sony FX2. Proporciona contexto e instrucciones útiles.";

const COMPLEX_INSTRUCTION: &str = "Eres un director de fotografía experimentado y un experto en la Sony FX2. El usuario tiene una consulta compleja. Proporciona una respuesta completa, detallada y de nivel profesional. Considera todos los aspectos de la solicitud del usuario, incluyendo configuraciones técnicas, opciones creativas y consejos prácticos. Estructura tu respuesta para una máxima claridad.";

pub const CHAT_APOLOGY: &str = "Lo siento, encontré un error al intentar buscar una respuesta. Por favor, revisa tu conexión o clave de API e inténtalo de nuevo.";
pub const IMAGE_APOLOGY: &str = "Lo siento, no pude analizar la imagen. Por favor, inténtalo de nuevo.";

const UNTITLED_SOURCE: &str = "Fuente sin título";

/// What an orchestrator does with a transport failure.
///
/// Two behaviors ship at once: chat and image swallow failures into a
/// fixed apology shown as a normal answer, while complex queries surface
/// the failure to the view. The split stays per-orchestrator until product
/// decides whether to unify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Substitute the given text for the answer and log the failure.
    Apologize(&'static str),
    /// Return the failure to the caller.
    Propagate,
}

impl ErrorPolicy {
    fn resolve(self, context: &str, err: TransportError) -> Result<String, TransportError> {
        match self {
            ErrorPolicy::Apologize(text) => {
                error!(%err, "{context} request failed");
                Ok(text.to_string())
            }
            ErrorPolicy::Propagate => Err(err),
        }
    }
}

/// A displayable chat answer: text plus the citations that survived
/// filtering.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Converts provider citation chunks into displayable sources. Chunks
/// without a URI are dropped; a missing title falls back to a fixed label.
pub fn sources_from_chunks(chunks: &[GroundingChunk]) -> Vec<Source> {
    chunks
        .iter()
        .filter_map(|chunk| {
            let web = chunk.web.as_ref()?;
            if web.uri.is_empty() {
                return None;
            }
            let title = if web.title.is_empty() {
                UNTITLED_SOURCE.to_string()
            } else {
                web.title.clone()
            };
            Some(Source {
                uri: web.uri.clone(),
                title,
            })
        })
        .collect()
}

/// Free-form chat grounded in live web search.
#[derive(Clone)]
pub struct ChatAssistant {
    transport: Arc<dyn Transport>,
    model: String,
    policy: ErrorPolicy,
}

impl ChatAssistant {
    pub fn new(
        transport: Arc<dyn Transport>,
        model: impl Into<String>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            policy,
        }
    }

    /// Sends one grounded question. Under a degrade policy this never
    /// fails: transport errors come back as the apology with no sources.
    pub async fn ask(&self, question: &str) -> Result<ChatReply, TransportError> {
        let request = Request {
            model: self.model.clone(),
            parts: vec![Part::Text(question.to_string())],
            options: RequestOptions {
                system_instruction: CHAT_INSTRUCTION.to_string(),
                enable_grounding: true,
                reasoning_budget: None,
            },
        };

        match self.transport.send(&request).await {
            Ok(raw) => Ok(ChatReply {
                sources: sources_from_chunks(&raw.grounding),
                text: raw.text,
            }),
            Err(err) => {
                let text = self.policy.resolve("chat", err)?;
                Ok(ChatReply {
                    text,
                    sources: Vec::new(),
                })
            }
        }
    }
}

/// Visual analysis of one image plus a question.
#[derive(Clone)]
pub struct ImageAssistant {
    transport: Arc<dyn Transport>,
    model: String,
    policy: ErrorPolicy,
}

impl ImageAssistant {
    pub fn new(
        transport: Arc<dyn Transport>,
        model: impl Into<String>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            policy,
        }
    }

    /// Analyzes one validated attachment. The image is encoded to its
    /// inline part before the request is assembled; the question text rides
    /// first, the image second.
    pub async fn analyze(
        &self,
        question: &str,
        image: &ImageAttachment,
    ) -> Result<String, TransportError> {
        let request = Request {
            model: self.model.clone(),
            parts: vec![Part::Text(question.to_string()), image.to_part()],
            options: RequestOptions {
                system_instruction: IMAGE_INSTRUCTION.to_string(),
                enable_grounding: false,
                reasoning_budget: None,
            },
        };

        match self.transport.send(&request).await {
            Ok(raw) => Ok(raw.text),
            Err(err) => self.policy.resolve("image analysis", err),
        }
    }
}

/// Long-form answers with an extended provider-side reasoning budget.
#[derive(Clone)]
pub struct ComplexAssistant {
    transport: Arc<dyn Transport>,
    model: String,
    policy: ErrorPolicy,
}

impl ComplexAssistant {
    pub fn new(
        transport: Arc<dyn Transport>,
        model: impl Into<String>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            policy,
        }
    }

    /// Sends one complex consultation. Under the shipped propagate policy
    /// failures surface to the caller, which renders its own error line.
    pub async fn consult(&self, question: &str) -> Result<String, TransportError> {
        let request = Request {
            model: self.model.clone(),
            parts: vec![Part::Text(question.to_string())],
            options: RequestOptions {
                system_instruction: COMPLEX_INSTRUCTION.to_string(),
                enable_grounding: false,
                reasoning_budget: Some(COMPLEX_REASONING_BUDGET),
            },
        };

        match self.transport.send(&request).await {
            Ok(raw) => Ok(raw.text),
            Err(err) => self.policy.resolve("complex query", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{RawResponse, WebSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fake transport: records requests, returns a canned answer or fails.
    struct StubTransport {
        text: &'static str,
        grounding: Vec<GroundingChunk>,
        fail: bool,
        calls: AtomicUsize,
        last_request: Mutex<Option<Request>>,
    }

    impl StubTransport {
        fn answering(text: &'static str, grounding: Vec<GroundingChunk>) -> Self {
            Self {
                text,
                grounding,
                fail: false,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::answering("", Vec::new())
            }
        }

        fn last_request(&self) -> Request {
            self.last_request.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if self.fail {
                return Err(TransportError::Network("connection refused".to_string()));
            }
            Ok(RawResponse {
                text: self.text.to_string(),
                grounding: self.grounding.clone(),
            })
        }
    }

    fn chunk(uri: &str, title: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebSource {
                uri: uri.to_string(),
                title: title.to_string(),
            }),
        }
    }

    fn png_attachment() -> ImageAttachment {
        ImageAttachment {
            file_name: "menu.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: b"pixels".to_vec(),
        }
    }

    #[test]
    fn empty_uri_sources_are_dropped() {
        let sources = sources_from_chunks(&[chunk("", "A"), chunk("http://x", "B")]);
        assert_eq!(
            sources,
            vec![Source {
                uri: "http://x".to_string(),
                title: "B".to_string(),
            }]
        );
    }

    #[test]
    fn missing_titles_get_the_fallback_label() {
        let sources = sources_from_chunks(&[chunk("http://x", ""), GroundingChunk { web: None }]);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Fuente sin título");
    }

    #[tokio::test]
    async fn chat_extracts_text_and_filtered_sources() {
        let stub = Arc::new(StubTransport::answering(
            "Paso 1...",
            vec![chunk("http://sony.com/a", "Manual")],
        ));
        let assistant = ChatAssistant::new(
            stub.clone(),
            DEFAULT_CHAT_MODEL,
            ErrorPolicy::Apologize(CHAT_APOLOGY),
        );

        let reply = assistant.ask("¿Cómo configuro S-Log3?").await.unwrap();
        assert_eq!(reply.text, "Paso 1...");
        assert_eq!(
            reply.sources,
            vec![Source {
                uri: "http://sony.com/a".to_string(),
                title: "Manual".to_string(),
            }]
        );

        let request = stub.last_request();
        assert!(request.options.enable_grounding);
        assert!(request.options.reasoning_budget.is_none());
    }

    #[tokio::test]
    async fn chat_failures_degrade_to_the_apology() {
        let stub = Arc::new(StubTransport::failing());
        let assistant =
            ChatAssistant::new(stub, DEFAULT_CHAT_MODEL, ErrorPolicy::Apologize(CHAT_APOLOGY));

        let reply = assistant.ask("¿Cómo configuro S-Log3?").await.unwrap();
        assert_eq!(reply.text, CHAT_APOLOGY);
        assert!(reply.sources.is_empty());
    }

    #[tokio::test]
    async fn repeated_failures_are_independent() {
        let stub = Arc::new(StubTransport::failing());
        let assistant = ChatAssistant::new(
            stub.clone(),
            DEFAULT_CHAT_MODEL,
            ErrorPolicy::Apologize(CHAT_APOLOGY),
        );

        for _ in 0..3 {
            let reply = assistant.ask("hola").await.unwrap();
            assert_eq!(reply.text, CHAT_APOLOGY);
            assert!(reply.sources.is_empty());
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn chat_can_be_reconfigured_to_propagate() {
        let stub = Arc::new(StubTransport::failing());
        let assistant = ChatAssistant::new(stub, DEFAULT_CHAT_MODEL, ErrorPolicy::Propagate);

        assert!(assistant.ask("hola").await.is_err());
    }

    #[tokio::test]
    async fn image_request_carries_the_inline_part() {
        let stub = Arc::new(StubTransport::answering("Es el menú de ISO.", Vec::new()));
        let assistant = ImageAssistant::new(
            stub.clone(),
            DEFAULT_CHAT_MODEL,
            ErrorPolicy::Apologize(IMAGE_APOLOGY),
        );

        let answer = assistant
            .analyze("¿Qué ajuste está resaltado?", &png_attachment())
            .await
            .unwrap();
        assert_eq!(answer, "Es el menú de ISO.");

        let request = stub.last_request();
        assert_eq!(request.parts.len(), 2);
        assert!(matches!(&request.parts[0], Part::Text(text) if text.contains("resaltado")));
        assert!(matches!(
            &request.parts[1],
            Part::Inline { mime_type, .. } if mime_type == "image/png"
        ));
        assert!(!request.options.enable_grounding);
    }

    #[tokio::test]
    async fn image_failures_degrade_to_the_apology() {
        let stub = Arc::new(StubTransport::failing());
        let assistant =
            ImageAssistant::new(stub, DEFAULT_CHAT_MODEL, ErrorPolicy::Apologize(IMAGE_APOLOGY));

        let answer = assistant
            .analyze("¿Qué es esto?", &png_attachment())
            .await
            .unwrap();
        assert_eq!(answer, IMAGE_APOLOGY);
    }

    #[tokio::test]
    async fn complex_sets_the_reasoning_budget() {
        let stub = Arc::new(StubTransport::answering("Respuesta detallada.", Vec::new()));
        let assistant =
            ComplexAssistant::new(stub.clone(), DEFAULT_PRO_MODEL, ErrorPolicy::Propagate);

        assistant.consult("Diseña una configuración").await.unwrap();

        let request = stub.last_request();
        assert_eq!(request.options.reasoning_budget, Some(32_768));
        assert!(!request.options.enable_grounding);
    }

    #[tokio::test]
    async fn complex_failures_propagate() {
        let stub = Arc::new(StubTransport::failing());
        let assistant = ComplexAssistant::new(stub, DEFAULT_PRO_MODEL, ErrorPolicy::Propagate);

        assert!(assistant.consult("hola").await.is_err());
    }
}
