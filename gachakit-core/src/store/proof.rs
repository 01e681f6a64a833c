use super::GachaStore;
use crate::error::{GachaKitError, PhaseError, PhaseOutcome};
use crate::state::GachaState;
use crate::types::{CircuitInputs, Phase, VerificationOutcome};

/// What the opening merge of a proof or verification phase decided.
enum EngineStart<T> {
    Skipped,
    Rejected(PhaseError),
    Started { cycle: u64, input: T },
}

impl<T> EngineStart<T> {
    /// Runs the guard shared by both engine phases, then `prepare` to take the
    /// phase inputs out of the state.
    fn open(
        state: &mut GachaState,
        phase: Phase,
        prepare: impl FnOnce(&mut GachaState) -> Result<T, PhaseError>,
    ) -> Self {
        if state.phase != Phase::Idle || !state.keys_initialized {
            return Self::Skipped;
        }
        match prepare(&mut *state) {
            Ok(input) => {
                state.phase = phase;
                Self::Started {
                    cycle: state.pull_cycle,
                    input,
                }
            }
            Err(error) => Self::Rejected(error),
        }
    }
}

impl GachaStore {
    /// Generates a proof for the current pull against the current root.
    ///
    /// Skipped unless the keys are initialized and no other phase runs. The
    /// previous proof and verification are cleared first, so a failure leaves
    /// no proof behind.
    pub async fn generate_proof_for_last_pull(&self) -> PhaseOutcome {
        let start = self.merge(|state| {
            EngineStart::open(state, Phase::Generating, |state| {
                state.clear_proof();
                match (&state.pull_result, &state.merkle_root) {
                    (Some(pull), Some(root)) => Ok(CircuitInputs::new(root, pull)),
                    _ => {
                        let error = PhaseError::from(&GachaKitError::MissingPrerequisite(
                            "Cannot generate proof: Missing pull data or Merkle root.".to_string(),
                        ));
                        state.proof_generation_error = Some(error.clone());
                        Err(error)
                    }
                }
            })
        });
        let (cycle, inputs) = match start {
            EngineStart::Skipped => {
                tracing::debug!("generate_proof_for_last_pull skipped");
                return PhaseOutcome::Skipped;
            }
            EngineStart::Rejected(error) => {
                tracing::error!("{error}");
                return PhaseOutcome::Failed(error);
            }
            EngineStart::Started { cycle, input } => (cycle, input),
        };

        tracing::debug!(item_id = %inputs.item_id_hex, "generating proof");
        let result = match self.loader.peek() {
            Ok(engine) => engine.generate_proof(&inputs).await.map_err(Into::into),
            Err(err) => Err(err),
        };

        self.merge(|state| {
            if state.pull_cycle != cycle {
                tracing::debug!("proof superseded, dropping it");
                return PhaseOutcome::Superseded;
            }
            state.phase = Phase::Idle;
            match result {
                Ok(proof) => {
                    tracing::info!(bytes = proof.len(), "proof generated");
                    state.proof = Some(proof);
                    state.clear_verification();
                    PhaseOutcome::Completed
                }
                Err(err) => {
                    tracing::error!("proof generation failed: {err}");
                    let error = PhaseError::from(&err);
                    state.proof_generation_error = Some(error.clone());
                    PhaseOutcome::Failed(error)
                }
            }
        })
    }

    /// Verifies the current proof against the current root.
    ///
    /// Skipped unless the keys are initialized and no other phase runs. The
    /// outcome stays [`VerificationOutcome::Unknown`] until the engine answers.
    pub async fn verify_proof_for_last_pull(&self) -> PhaseOutcome {
        let start = self.merge(|state| {
            EngineStart::open(state, Phase::Verifying, |state| {
                state.clear_verification();
                match (&state.merkle_root, &state.proof) {
                    (Some(root), Some(proof)) => Ok((root.clone(), proof.clone())),
                    _ => {
                        let error = PhaseError::from(&GachaKitError::MissingPrerequisite(
                            "Cannot verify: No proof or Merkle root available.".to_string(),
                        ));
                        state.verification_error = Some(error.clone());
                        Err(error)
                    }
                }
            })
        });
        let (cycle, (root, proof)) = match start {
            EngineStart::Skipped => {
                tracing::debug!("verify_proof_for_last_pull skipped");
                return PhaseOutcome::Skipped;
            }
            EngineStart::Rejected(error) => {
                tracing::error!("{error}");
                return PhaseOutcome::Failed(error);
            }
            EngineStart::Started { cycle, input } => (cycle, input),
        };

        tracing::debug!(%root, "verifying proof");
        let result = match self.loader.peek() {
            Ok(engine) => engine.verify_proof(&root, &proof).await.map_err(Into::into),
            Err(err) => Err(err),
        };

        self.merge(|state| {
            if state.pull_cycle != cycle {
                tracing::debug!("verification superseded, dropping it");
                return PhaseOutcome::Superseded;
            }
            state.phase = Phase::Idle;
            match result {
                Ok(valid) => {
                    tracing::info!(valid, "proof verified");
                    state.verification_result = VerificationOutcome::from(valid);
                    PhaseOutcome::Completed
                }
                Err(err) => {
                    tracing::error!("proof verification failed: {err}");
                    let error = PhaseError::from(&err);
                    state.verification_error = Some(error.clone());
                    PhaseOutcome::Failed(error)
                }
            }
        })
    }
}
