//! Analysis pipeline: wires lookup results, evidence, prompts, generation,
//! rendering and storage into the three task flows.
//!
//! Flow: aggregate evidence → render prompt → generate → shape document →
//!       render PDF → store → return handles.
//!
//! Each call is one linear pass. Nothing is retried: a failed generation is
//! reported and the caller re-submits.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::errors::AppError;
use crate::evidence::{aggregate, AggregatedEvidence, EvidenceDocument, PdfTextExtractor, TextExtractor};
use crate::llm_client::{ApiCredential, LlmError, TextGenerator};
use crate::prompts::{PromptTemplates, TaskKind};
use crate::records::Record;
use crate::render::{render_document, DocumentRenderer};

/// Questions kept from one questionnaire generation.
pub const MAX_QUESTIONS: usize = 90;

const HEADER_RULE_WIDTH: usize = 50;
const PART_RULE_WIDTH: usize = 60;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireOutcome {
    pub business_name: String,
    pub questions: Vec<String>,
    pub pdf_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwotOutcome {
    pub business_name: String,
    pub swot_analysis: String,
    pub processed_files: Vec<String>,
    pub pdf_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionPlanOutcome {
    pub business_name: String,
    pub action_plan: String,
    pub processed_files: Vec<String>,
    /// Action plan on its own.
    pub action_pdf_id: Uuid,
    /// SWOT followed by the action plan.
    pub comprehensive_pdf_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// The collaborators every task flow needs. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline<E = PdfTextExtractor> {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptTemplates>,
    renderer: Arc<dyn DocumentRenderer>,
    artifacts: ArtifactStore,
    extractor: E,
    extraction_timeout: Duration,
}

impl Pipeline<PdfTextExtractor> {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        prompts: Arc<PromptTemplates>,
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: ArtifactStore,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            prompts,
            renderer,
            artifacts,
            extractor: PdfTextExtractor,
            extraction_timeout,
        }
    }
}

impl<E> Pipeline<E>
where
    E: TextExtractor + Clone + 'static,
{
    /// Swaps the evidence extractor.
    #[cfg(test)]
    pub fn with_extractor<F>(self, extractor: F) -> Pipeline<F> {
        Pipeline {
            llm: self.llm,
            prompts: self.prompts,
            renderer: self.renderer,
            artifacts: self.artifacts,
            extractor,
            extraction_timeout: self.extraction_timeout,
        }
    }

    /// Generates a diagnostic questionnaire from the profile alone.
    pub async fn questionnaire(
        &self,
        record: &Record,
        credential: &ApiCredential,
    ) -> Result<QuestionnaireOutcome, AppError> {
        let name = record.business_name().to_string();
        info!("Generating questionnaire for '{name}'");

        let prompt = self
            .prompts
            .render(TaskKind::Questionnaire, record, "", None)?;
        let output = self.generate(TaskKind::Questionnaire, &prompt, credential).await?;

        let questions = parse_questions(&output);
        if questions.is_empty() {
            return Err(AppError::Upstream(
                "Generation returned no usable questions".to_string(),
            ));
        }
        info!("Parsed {} questions for '{name}'", questions.len());

        let pdf_id = self
            .publish(
                questionnaire_document(&name, &questions),
                format!("Questionnaire Diagnostic - {name}"),
            )
            .await?;

        Ok(QuestionnaireOutcome {
            business_name: name,
            questions,
            pdf_id,
        })
    }

    /// Produces a SWOT analysis from the profile and the answered questionnaires.
    pub async fn swot(
        &self,
        record: &Record,
        documents: &[EvidenceDocument],
        credential: &ApiCredential,
    ) -> Result<SwotOutcome, AppError> {
        let name = record.business_name().to_string();
        let evidence = self.gather(documents).await?;
        info!(
            "Generating SWOT for '{name}' from {} documents",
            evidence.processed_files.len()
        );

        let prompt = self
            .prompts
            .render(TaskKind::Swot, record, &evidence.text, None)?;
        let swot_analysis = self.generate(TaskKind::Swot, &prompt, credential).await?;

        let document = format!(
            "{}{}\n\n{swot_analysis}",
            document_header("ANALYSE SWOT", &name, &evidence.processed_files),
            "=".repeat(HEADER_RULE_WIDTH)
        );
        let pdf_id = self
            .publish(document, format!("Analyse SWOT - {name}"))
            .await?;

        Ok(SwotOutcome {
            business_name: name,
            swot_analysis,
            processed_files: evidence.processed_files,
            pdf_id,
        })
    }

    /// Builds an action plan on top of a previously generated SWOT analysis.
    ///
    /// Emits two documents: the plan alone and the SWOT + plan combination.
    pub async fn action_plan(
        &self,
        record: &Record,
        documents: &[EvidenceDocument],
        swot_analysis: &str,
        credential: &ApiCredential,
    ) -> Result<ActionPlanOutcome, AppError> {
        let swot_analysis = swot_analysis.trim();
        if swot_analysis.is_empty() {
            return Err(AppError::Precondition(
                "An action plan requires a non-empty SWOT analysis".to_string(),
            ));
        }

        let name = record.business_name().to_string();
        let evidence = self.gather(documents).await?;
        info!(
            "Generating action plan for '{name}' from {} documents",
            evidence.processed_files.len()
        );

        let prompt = self.prompts.render(
            TaskKind::ActionPlan,
            record,
            &evidence.text,
            Some(swot_analysis),
        )?;
        let action_plan = self.generate(TaskKind::ActionPlan, &prompt, credential).await?;

        let plan_document = format!(
            "{}{}\n\n{action_plan}",
            document_header("PLAN D'ACTION", &name, &evidence.processed_files),
            "=".repeat(HEADER_RULE_WIDTH)
        );
        let combined_document =
            comprehensive_document(&name, &evidence.processed_files, swot_analysis, &action_plan);

        let (action_pdf_id, comprehensive_pdf_id) = tokio::try_join!(
            self.publish(plan_document, format!("Plan d'action - {name}")),
            self.publish(combined_document, format!("Strategie Complete - {name}")),
        )?;

        Ok(ActionPlanOutcome {
            business_name: name,
            action_plan,
            processed_files: evidence.processed_files,
            action_pdf_id,
            comprehensive_pdf_id,
        })
    }

    async fn gather(&self, documents: &[EvidenceDocument]) -> Result<AggregatedEvidence, AppError> {
        aggregate(documents, self.extractor.clone(), self.extraction_timeout).await
    }

    async fn generate(
        &self,
        kind: TaskKind,
        prompt: &str,
        credential: &ApiCredential,
    ) -> Result<String, AppError> {
        debug!("Sending {} prompt ({} chars)", kind.as_str(), prompt.len());
        self.llm
            .generate(prompt, credential)
            .await
            .map_err(|e| match e {
                LlmError::MissingCredential => AppError::Validation(e.to_string()),
                other => AppError::Upstream(other.to_string()),
            })
    }

    /// Renders `text` to PDF and stores it.
    async fn publish(&self, text: String, title: String) -> Result<Uuid, AppError> {
        let bytes = render_document(self.renderer.clone(), text, title).await?;
        self.artifacts.put(bytes).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output shaping
// ────────────────────────────────────────────────────────────────────────────

/// Splits generated text into questions: one per non-empty line, leading
/// enumeration removed, at most `MAX_QUESTIONS`.
pub fn parse_questions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| strip_enumeration(line.trim()))
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .map(str::to_string)
        .collect()
}

/// Removes a `12.`, `12)`, `12 `, `-`, `*` or `•` prefix.
fn strip_enumeration(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix(['.', ')']) {
            return after.trim_start();
        }
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
        return line;
    }
    for marker in ['-', '*', '•'] {
        if let Some(after) = line.strip_prefix(marker) {
            return after.trim_start();
        }
    }
    line
}

pub fn questionnaire_document(name: &str, questions: &[String]) -> String {
    let numbered = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!("QUESTIONNAIRE DIAGNOSTIC - {name}\n\n{numbered}")
}

/// Heading plus the list of documents that contributed evidence.
fn document_header(heading: &str, name: &str, processed_files: &[String]) -> String {
    format!(
        "{heading} - {name}\n\n\
         Documents analysés: {}\n\
         Nombre de documents PDF traités: {}\n\n",
        processed_files.join(", "),
        processed_files.len()
    )
}

pub fn comprehensive_document(
    name: &str,
    processed_files: &[String],
    swot_analysis: &str,
    action_plan: &str,
) -> String {
    let rule = "=".repeat(PART_RULE_WIDTH);
    format!(
        "{header}{rule}\nPARTIE 1: ANALYSE SWOT\n{rule}\n\n{swot_analysis}\n\n\
         {rule}\nPARTIE 2: PLAN D'ACTION STRATEGIQUE\n{rule}\n\n{action_plan}",
        header = document_header("ANALYSE STRATEGIQUE COMPLETE", name, processed_files),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use lopdf::Document;

    use super::*;
    use crate::evidence::ExtractError;
    use crate::llm_client::OpenAiClient;
    use crate::render::encoding::decode_text_string;
    use crate::records::{lookup, Dataset};
    use crate::render::{PdfRenderer, RenderStyle};

    /// Returns a canned reply and remembers every prompt it was sent.
    struct StubGenerator {
        reply: Result<String, (u16, String)>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16, message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err((status, message.to_string())),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str, _: &ApiCredential) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err((status, message)) => Err(LlmError::Api {
                    status: *status,
                    message: message.clone(),
                }),
            }
        }
    }

    /// Document bytes are the text; `"FAIL"` is unreadable.
    #[derive(Clone)]
    struct StubExtractor;

    impl TextExtractor for StubExtractor {
        fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
            match bytes {
                b"FAIL" => Err(ExtractError::Pdf("bad xref".to_string())),
                other => Ok(String::from_utf8_lossy(other).into_owned()),
            }
        }
    }

    fn pipeline(
        llm: Arc<StubGenerator>,
        dir: &std::path::Path,
    ) -> Pipeline<StubExtractor> {
        Pipeline::new(
            llm,
            Arc::new(PromptTemplates::default()),
            Arc::new(PdfRenderer::new(RenderStyle::Styled)),
            ArtifactStore::new(dir, None),
            Duration::from_secs(5),
        )
        .with_extractor(StubExtractor)
    }

    fn acme() -> Record {
        let dataset =
            Dataset::from_csv(b"Business Name,Sector\nGlobex,Energy\nAcme,Retail\n").unwrap();
        lookup(&dataset, "Business Name", "acme").unwrap()
    }

    fn key() -> ApiCredential {
        ApiCredential::new("sk-test").unwrap()
    }

    fn pdf_title(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let info = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let title = doc
            .get_object(info)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Title")
            .unwrap()
            .as_str()
            .unwrap();
        decode_text_string(title)
    }

    fn docs(bodies: &[(&str, &str)]) -> Vec<EvidenceDocument> {
        bodies
            .iter()
            .map(|(name, body)| EvidenceDocument::new(*name, body.as_bytes().to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_questionnaire_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::replying("1. Q one\n2. Q two");
        let pipeline = pipeline(llm.clone(), dir.path());

        let outcome = pipeline.questionnaire(&acme(), &key()).await.unwrap();
        assert_eq!(outcome.business_name, "Acme");
        assert_eq!(outcome.questions, vec!["Q one", "Q two"]);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Sector: Retail"));
        assert!(!prompts[0].contains("Globex"));

        let bytes = pipeline.artifacts.get(&outcome.pdf_id.to_string()).await.unwrap();
        assert!(pdf_title(&bytes).contains("Acme"));
    }

    #[tokio::test]
    async fn test_swot_skips_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::replying("## FORCES\n- Réseau local");
        let pipeline = pipeline(llm.clone(), dir.path());
        let documents = docs(&[
            ("a.pdf", "Réponses A"),
            ("b.pdf", "FAIL"),
            ("c.pdf", "Réponses C"),
        ]);

        let outcome = pipeline.swot(&acme(), &documents, &key()).await.unwrap();
        assert_eq!(outcome.processed_files, vec!["a.pdf", "c.pdf"]);
        assert_eq!(outcome.swot_analysis, "## FORCES\n- Réseau local");

        let prompt = &llm.prompts()[0];
        let first = prompt.find("=== DOCUMENT 1: a.pdf ===").unwrap();
        let third = prompt.find("=== DOCUMENT 3: c.pdf ===").unwrap();
        assert!(first < third);
        assert!(!prompt.contains("DOCUMENT 2"));

        let bytes = pipeline.artifacts.get(&outcome.pdf_id.to_string()).await.unwrap();
        assert_eq!(pdf_title(&bytes), "Analyse SWOT - Acme");
    }

    #[tokio::test]
    async fn test_swot_with_no_readable_documents_never_calls_generator() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::replying("unused");
        let pipeline = pipeline(llm.clone(), dir.path());

        let err = pipeline
            .swot(&acme(), &docs(&[("a.pdf", "FAIL")]), &key())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_CONTENT");
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_action_plan_requires_swot_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::replying("unused");
        let pipeline = pipeline(llm.clone(), dir.path());

        // "FAIL" would surface as NO_CONTENT if extraction ran first
        let err = pipeline
            .action_plan(&acme(), &docs(&[("a.pdf", "FAIL")]), "  \n ", &key())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_action_plan_stores_two_documents() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::replying("### ACTION 1\n**ÉCHÉANCE**: T3");
        let pipeline = pipeline(llm.clone(), dir.path());

        let outcome = pipeline
            .action_plan(
                &acme(),
                &docs(&[("a.pdf", "Réponses")]),
                "## FORCES\n- Marque reconnue",
                &key(),
            )
            .await
            .unwrap();

        assert_ne!(outcome.action_pdf_id, outcome.comprehensive_pdf_id);
        assert_eq!(outcome.processed_files, vec!["a.pdf"]);
        assert!(llm.prompts()[0].contains("Marque reconnue"));

        let plan = pipeline
            .artifacts
            .get(&outcome.action_pdf_id.to_string())
            .await
            .unwrap();
        let combined = pipeline
            .artifacts
            .get(&outcome.comprehensive_pdf_id.to_string())
            .await
            .unwrap();
        assert_eq!(pdf_title(&plan), "Plan d'action - Acme");
        assert_eq!(pdf_title(&combined), "Strategie Complete - Acme");
    }

    #[tokio::test]
    async fn test_generation_failure_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubGenerator::failing(401, "Incorrect API key provided");
        let pipeline = pipeline(llm, dir.path());

        let err = pipeline.questionnaire(&acme(), &key()).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        assert!(err.to_string().contains("Incorrect API key"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parse_questions_strips_enumeration() {
        let output = "1. Quel est votre CA ?\n\n  2) Combien de salariés ?\n- Canal principal ?\n\
                      10 Depuis quand ?\n3D ou 2D ?\n1.";
        assert_eq!(
            parse_questions(output),
            vec![
                "Quel est votre CA ?",
                "Combien de salariés ?",
                "Canal principal ?",
                "Depuis quand ?",
                "3D ou 2D ?",
            ]
        );
    }

    #[test]
    fn test_parse_questions_caps_count() {
        let output = (1..=120)
            .map(|i| format!("{i}. Question {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let questions = parse_questions(&output);
        assert_eq!(questions.len(), MAX_QUESTIONS);
        assert_eq!(questions[89], "Question 90");
    }

    #[tokio::test]
    async fn test_generation_timeout_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(1));
                w.write_all(br#"{"choices":[{"message":{"content":"1. Q"}}]}"#)
            })
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = OpenAiClient::new(server.url(), Duration::from_millis(100)).unwrap();
        let pipeline = Pipeline::new(
            Arc::new(client),
            Arc::new(PromptTemplates::default()),
            Arc::new(PdfRenderer::new(RenderStyle::Basic)),
            ArtifactStore::new(dir.path(), None),
            Duration::from_secs(5),
        );

        let err = pipeline.questionnaire(&acme(), &key()).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)), "got {err:?}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_comprehensive_document_layout() {
        let files = vec!["a.pdf".to_string(), "b.pdf".to_string()];
        let text = comprehensive_document("Acme", &files, "SWOT", "PLAN");
        let rule = "=".repeat(60);

        assert!(text.starts_with(
            "ANALYSE STRATEGIQUE COMPLETE - Acme\n\nDocuments analysés: a.pdf, b.pdf\n\
             Nombre de documents PDF traités: 2\n\n"
        ));
        let part1 = text.find("PARTIE 1: ANALYSE SWOT").unwrap();
        let part2 = text.find("PARTIE 2: PLAN D'ACTION STRATEGIQUE").unwrap();
        assert!(part1 < text.find("SWOT\n\n").unwrap());
        assert!(part2 < text.rfind("\n\nPLAN").unwrap());
        assert_eq!(text.matches(&rule).count(), 4);
        assert!(text.ends_with("\n\nPLAN"));
    }

    #[test]
    fn test_questionnaire_document_numbers_questions() {
        let questions = vec!["Q one".to_string(), "Q two".to_string()];
        assert_eq!(
            questionnaire_document("Acme", &questions),
            "QUESTIONNAIRE DIAGNOSTIC - Acme\n\n1. Q one\n2. Q two"
        );
    }
}
