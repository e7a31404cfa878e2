//! Receipt processing pipeline.
//!
//! An explicit state machine drives a run from input to terminal state:
//!
//! ```text
//! entry ── image ──> inspect ──> validate ──> classify ──> compute_and_record ──> done
//!   │                               │
//!   │                               └──> human_input ──> done
//!   └── no image ──> tax_question ──> done
//! ```
//!
//! Every stage failure is expressed in the terminal [`PipelineState`]
//! rather than raised: extraction errors become the receipt's error
//! marker, classification failures become fallback classifications, and
//! persistence failures become a failed [`RecordOutcome`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::advisor::Advisor;
use crate::ai::{Reasoner, ReasonerClient};
use crate::classify::{Classifier, ANALYSIS_ERROR_REASONING};
use crate::images::ImageStore;
use crate::kb::{context_text, Retriever};
use crate::models::{Classification, ReceiptData, RecordOutcome, TransactionStatus};
use crate::recorder::TransactionRecorder;
use crate::validate::{validate_receipt, Routing, REQUIRED_FIELDS};

/// Pipeline stages, in the order a receipt run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Entry,
    Inspect,
    Validate,
    Classify,
    ComputeAndRecord,
    HumanInput,
    TaxQuestion,
    Done,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run finished; the reply and outcome describe the result
    Completed,
    /// The run stopped because the receipt needs user-provided fields
    AwaitingUserInput,
}

/// Input to a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub user_id: String,
    /// Free-text question; used when no image is attached
    pub question: String,
    /// Receipt image bytes
    pub image: Option<Vec<u8>>,
}

/// State accumulated across stages; the terminal value is the run result.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub status: RunStatus,
    /// User-facing reply for the run
    pub reply: String,
    pub receipt: Option<ReceiptData>,
    pub classification: Option<Classification>,
    pub outcome: Option<RecordOutcome>,
    /// Fields the user must supply when status is awaiting_user_input
    pub missing_fields: Vec<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            status: RunStatus::Completed,
            reply: String::new(),
            receipt: None,
            classification: None,
            outcome: None,
            missing_fields: Vec::new(),
        }
    }
}

/// The receipt pipeline and its collaborators.
#[derive(Clone)]
pub struct Pipeline {
    reasoner: ReasonerClient,
    retriever: Retriever,
    classifier: Classifier,
    recorder: TransactionRecorder,
    advisor: Advisor,
    images: Option<ImageStore>,
}

impl Pipeline {
    pub fn new(
        reasoner: ReasonerClient,
        retriever: Retriever,
        classifier: Classifier,
        recorder: TransactionRecorder,
        advisor: Advisor,
        images: Option<ImageStore>,
    ) -> Self {
        Self {
            reasoner,
            retriever,
            classifier,
            recorder,
            advisor,
            images,
        }
    }

    /// Run the state machine to its terminal state.
    pub async fn run(&self, request: PipelineRequest) -> PipelineState {
        let mut state = PipelineState::default();
        let mut stage = Stage::Entry;

        while stage != Stage::Done {
            let next = self.step(stage, &request, &mut state).await;
            debug!(from = ?stage, to = ?next, "Pipeline transition");
            stage = next;
        }

        state
    }

    async fn step(
        &self,
        stage: Stage,
        request: &PipelineRequest,
        state: &mut PipelineState,
    ) -> Stage {
        match stage {
            Stage::Entry => {
                if request.image.is_some() {
                    Stage::Inspect
                } else {
                    Stage::TaxQuestion
                }
            }

            Stage::Inspect => {
                let image = request.image.as_deref().unwrap_or_default();
                let receipt = match self.reasoner.extract_receipt(image).await {
                    Ok(receipt) => receipt,
                    Err(e) => {
                        warn!(error = %e, "Receipt extraction failed");
                        ReceiptData::failed(e.to_string())
                    }
                };
                state.receipt = Some(receipt);
                Stage::Validate
            }

            Stage::Validate => {
                let routing = match state.receipt.as_ref() {
                    Some(receipt) => validate_receipt(receipt),
                    None => Routing::HumanInput {
                        missing_fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
                    },
                };
                match routing {
                    Routing::Proceed => Stage::Classify,
                    Routing::HumanInput { missing_fields } => {
                        state.missing_fields = missing_fields;
                        Stage::HumanInput
                    }
                }
            }

            Stage::Classify => {
                if let Some(receipt) = state.receipt.clone() {
                    let chunks = self.retriever.receipt_context(&receipt);
                    let classification = self
                        .classifier
                        .classify(&receipt, &context_text(&chunks))
                        .await;
                    state.classification = Some(classification);
                }
                Stage::ComputeAndRecord
            }

            Stage::ComputeAndRecord => {
                let outcome = self.record_receipt(request, state);
                state.reply = match &outcome {
                    RecordOutcome::Saved(saved) => saved.message.clone(),
                    RecordOutcome::Failed { error } => {
                        format!("Error saving transaction: {error}")
                    }
                };
                state.outcome = Some(outcome);
                state.status = RunStatus::Completed;
                Stage::Done
            }

            Stage::HumanInput => {
                state.status = RunStatus::AwaitingUserInput;
                state.reply = format!(
                    "Cannot read receipt clearly. Please provide: {}",
                    state.missing_fields.join(", ")
                );
                Stage::Done
            }

            Stage::TaxQuestion => {
                state.reply = self.advisor.answer(&request.question).await;
                state.status = RunStatus::Completed;
                Stage::Done
            }

            Stage::Done => Stage::Done,
        }
    }

    fn record_receipt(&self, request: &PipelineRequest, state: &PipelineState) -> RecordOutcome {
        let receipt = match state.receipt.as_ref() {
            Some(receipt) => receipt,
            None => {
                return RecordOutcome::Failed {
                    error: "No receipt data to record".to_string(),
                }
            }
        };
        let classification = state
            .classification
            .clone()
            .unwrap_or_else(|| Classification::fallback(ANALYSIS_ERROR_REASONING));

        let receipt_image = self.store_image(request);

        match self.recorder.record(
            &request.user_id,
            receipt,
            &classification,
            receipt_image,
            TransactionStatus::Verified,
        ) {
            Ok(saved) => RecordOutcome::Saved(saved),
            Err(e) => {
                warn!(error = %e, "Failed to record transaction");
                RecordOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn store_image(&self, request: &PipelineRequest) -> Option<String> {
        let store = self.images.as_ref()?;
        let image = request.image.as_deref()?;
        match store.save(image) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(error = %e, "Failed to store receipt image");
                None
            }
        }
    }
}
