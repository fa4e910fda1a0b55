//! Async session around one wizard.
//!
//! The wizard lock is never held across an await. In-flight requests race
//! against a per-request cancel and the session-wide shutdown signal, so a
//! response that arrives after `retreat`, `reset` or `close` is dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use peds_dose_api::DoseApi;
use tokio::sync::{oneshot, watch};

use crate::config::WizardConfig;
use crate::display::{ResultDisplay, ResultUnit};
use crate::models::{CatalogMatch, Gender, PatientInfo};

use super::{
    StepView, SubmitOutcome, SubmitStart, Wizard, WizardError, WizardResult, WizardState,
    WizardStep,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn closed(rx: &mut watch::Receiver<bool>) {
    loop {
        let is_closed = *rx.borrow_and_update();
        if is_closed {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// One user's pass through the wizard, bound to a calculation service.
pub struct WizardSession {
    session_id: String,
    started_at: String,
    api: Arc<dyn DoseApi>,
    wizard: Mutex<Wizard>,
    /// Cancel handle for the request in flight, keyed by its epoch
    inflight: Mutex<Option<(u64, oneshot::Sender<()>)>>,
    shutdown: watch::Sender<bool>,
}

impl WizardSession {
    pub fn new(config: WizardConfig, api: Arc<dyn DoseApi>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            api,
            wizard: Mutex::new(Wizard::new(config)),
            inflight: Mutex::new(None),
            shutdown,
        };
        tracing::info!(session_id = %session.session_id, "Wizard session started");
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// RFC 3339 timestamp of session creation.
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn ensure_open(&self) -> WizardResult<()> {
        if self.is_closed() {
            Err(WizardError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn wizard(&self) -> MutexGuard<'_, Wizard> {
        lock(&self.wizard)
    }

    /// Copy of the current wizard state.
    pub fn snapshot(&self) -> WizardState {
        self.wizard().state().clone()
    }

    pub fn step(&self) -> WizardStep {
        self.wizard().step()
    }

    pub fn view(&self) -> StepView {
        self.wizard().view()
    }

    /// Run `f` against the wizard under the lock.
    pub fn with_wizard<R>(&self, f: impl FnOnce(&Wizard) -> R) -> R {
        f(&self.wizard())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch the drug catalog. Also the retry action after a failure.
    ///
    /// A failure is recorded on the wizard and returned.
    pub async fn load_catalog(&self) -> WizardResult<usize> {
        self.ensure_open()?;
        self.wizard().begin_catalog_load();

        let mut shutdown = self.shutdown.subscribe();
        let outcome = tokio::select! {
            outcome = self.api.list_drugs() => outcome,
            _ = closed(&mut shutdown) => {
                self.wizard().cancel_catalog_load();
                return Err(WizardError::SessionClosed);
            }
        };

        let mut wizard = self.wizard();
        let result = outcome.clone().map(|drugs| drugs.len()).map_err(WizardError::from);
        wizard.finish_catalog_load(outcome);
        result
    }

    pub fn search_catalog(&self, query: &str, limit: usize) -> Vec<CatalogMatch> {
        self.wizard().catalog().search(query, limit)
    }

    // =========================================================================
    // Patient
    // =========================================================================

    pub fn set_patient(&self, patient: PatientInfo) -> WizardResult<()> {
        self.wizard().set_patient(patient)
    }

    pub fn set_age_years(&self, age_years: Option<f64>) -> WizardResult<()> {
        self.wizard().set_age_years(age_years)
    }

    pub fn set_age_months(&self, age_months: Option<u32>) -> WizardResult<()> {
        self.wizard().set_age_months(age_months)
    }

    pub fn set_weight(&self, weight_kg: Option<f64>) -> WizardResult<()> {
        self.wizard().set_weight(weight_kg)
    }

    pub fn set_gender(&self, gender: Option<Gender>) -> WizardResult<()> {
        self.wizard().set_gender(gender)
    }

    // =========================================================================
    // Drug, concentration, frequency
    // =========================================================================

    /// Select a drug and load its frequencies.
    pub async fn select_drug(&self, drug_id: &str) -> WizardResult<()> {
        self.ensure_open()?;
        let changed = self.wizard().select_drug(drug_id)?;
        if !changed {
            return Ok(());
        }

        let mut shutdown = self.shutdown.subscribe();
        let outcome = tokio::select! {
            outcome = self.api.drug_detail(drug_id) => outcome,
            _ = closed(&mut shutdown) => return Err(WizardError::SessionClosed),
        };
        self.wizard().apply_drug_detail(drug_id, outcome);
        Ok(())
    }

    pub fn select_concentration(&self, index: usize) -> WizardResult<()> {
        self.wizard().select_concentration(index)
    }

    pub fn set_custom_concentration(&self, mg: f64, ml: f64) -> WizardResult<()> {
        self.wizard().set_custom_concentration(mg, ml)
    }

    pub fn select_frequency(&self, code: &str) -> WizardResult<()> {
        self.wizard().select_frequency(code)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn advance(&self) -> WizardResult<WizardStep> {
        self.wizard().advance()
    }

    pub fn retreat(&self) -> WizardStep {
        let (step, epoch) = {
            let mut wizard = self.wizard();
            let step = wizard.retreat();
            (step, wizard.epoch())
        };
        self.cancel_stale(epoch);
        step
    }

    pub fn reset(&self) {
        let epoch = {
            let mut wizard = self.wizard();
            wizard.reset();
            wizard.epoch()
        };
        self.cancel_stale(epoch);
    }

    /// Abort the in-flight request if it belongs to an older epoch.
    fn cancel_stale(&self, current_epoch: u64) {
        let mut inflight = lock(&self.inflight);
        if matches!(inflight.as_ref(), Some((epoch, _)) if *epoch != current_epoch) {
            if let Some((epoch, cancel)) = inflight.take() {
                tracing::debug!(epoch, "Cancelling stale calculation request");
                let _ = cancel.send(());
            }
        }
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Send the calculation request and apply its outcome.
    pub async fn submit_calculation(&self) -> WizardResult<SubmitOutcome> {
        self.ensure_open()?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let ticket = {
            // Registered under the wizard lock: the stored handle always
            // belongs to the live epoch.
            let mut wizard = self.wizard();
            match wizard.begin_submit()? {
                SubmitStart::Started(ticket) => {
                    *lock(&self.inflight) = Some((ticket.epoch, cancel_tx));
                    ticket
                }
                SubmitStart::AlreadyInFlight => {
                    tracing::debug!("Calculation already in flight");
                    return Ok(SubmitOutcome::AlreadyInFlight);
                }
            }
        };
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(
            session_id = %self.session_id,
            drug_id = %ticket.request.drug_id,
            frequency = %ticket.request.frequency,
            epoch = ticket.epoch,
            "Submitting calculation"
        );

        let outcome = tokio::select! {
            outcome = self.api.calculate(&ticket.request) => Some(outcome),
            // A dropped sender is not a cancel
            Ok(()) = cancel_rx => None,
            _ = closed(&mut shutdown) => None,
        };

        {
            let mut inflight = lock(&self.inflight);
            if matches!(inflight.as_ref(), Some((epoch, _)) if *epoch == ticket.epoch) {
                inflight.take();
            }
        }

        let mut wizard = self.wizard();
        let result = match outcome {
            Some(outcome) => wizard.finish_submit(ticket.epoch, outcome),
            None => {
                wizard.abandon_submit(ticket.epoch);
                SubmitOutcome::Discarded
            }
        };

        match &result {
            SubmitOutcome::Completed => tracing::info!(epoch = ticket.epoch, "Calculation completed"),
            SubmitOutcome::Failed(failure) => tracing::warn!(
                epoch = ticket.epoch,
                retryable = failure.retryable,
                error = %failure.message,
                "Calculation failed"
            ),
            SubmitOutcome::Discarded => tracing::debug!(epoch = ticket.epoch, "Calculation discarded"),
            SubmitOutcome::AlreadyInFlight => {}
        }
        Ok(result)
    }

    // =========================================================================
    // Result
    // =========================================================================

    pub fn set_result_unit(&self, unit: ResultUnit) {
        self.wizard().set_result_unit(unit);
    }

    pub fn toggle_result_unit(&self) -> ResultUnit {
        self.wizard().toggle_result_unit()
    }

    pub fn result_display(&self) -> Option<ResultDisplay> {
        self.wizard().result_display()
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Abort anything in flight and refuse further requests. Idempotent.
    pub fn close(&self) {
        let was_closed = self.shutdown.send_replace(true);
        let inflight = lock(&self.inflight).take();
        if let Some((epoch, cancel)) = inflight {
            let _ = cancel.send(());
            self.wizard().abandon_submit(epoch);
        }
        if !was_closed {
            tracing::info!(session_id = %self.session_id, "Wizard session closed");
        }
    }
}

impl Drop for WizardSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::CatalogStatus;
    use peds_dose_api::{sample_result, ApiError, MockDoseApi};

    async fn session_with(api: Arc<MockDoseApi>) -> WizardSession {
        let session = WizardSession::new(WizardConfig::default(), api);
        session.load_catalog().await.unwrap();
        session
    }

    async fn walk_to_review(session: &WizardSession) {
        session
            .set_patient(PatientInfo {
                age_years: Some(2.0),
                age_months: Some(6),
                weight_kg: Some(12.0),
                gender: Some(Gender::Male),
            })
            .unwrap();
        session.advance().unwrap();
        session.select_drug("paracetamol-syrup").await.unwrap();
        session.advance().unwrap();
        session.select_concentration(0).unwrap();
        session.advance().unwrap();
        session.select_frequency("q6h").unwrap();
        session.advance().unwrap();
    }

    #[tokio::test]
    async fn test_catalog_failure_then_retry() {
        let api = Arc::new(MockDoseApi::new());
        api.set_catalog(Err(ApiError::Connection("http://localhost:3000".into())));
        let session = WizardSession::new(WizardConfig::default(), api.clone());

        assert!(matches!(
            session.load_catalog().await,
            Err(WizardError::Api(ApiError::Connection(_)))
        ));
        assert!(session.with_wizard(|w| w.catalog().is_empty()));

        api.set_catalog(Ok(peds_dose_api::sample_catalog()));
        assert_eq!(session.load_catalog().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_select_drug_loads_frequencies_once() {
        let api = Arc::new(MockDoseApi::with_sample_catalog());
        let session = session_with(api.clone()).await;
        session
            .set_patient(PatientInfo {
                age_years: Some(5.0),
                weight_kg: Some(18.0),
                ..Default::default()
            })
            .unwrap();
        session.advance().unwrap();

        session.select_drug("ibuprofen-suspension").await.unwrap();
        session.select_drug("ibuprofen-suspension").await.unwrap();
        assert_eq!(api.detail_calls(), 1);
        assert_eq!(session.snapshot().frequency_options.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_sends_request() {
        let api = Arc::new(MockDoseApi::with_sample_catalog());
        api.respond_with(Ok(sample_result()));
        let session = session_with(api.clone()).await;
        walk_to_review(&session).await;

        assert_eq!(session.submit_calculation().await.unwrap(), SubmitOutcome::Completed);
        let request = api.last_request().unwrap();
        assert_eq!(request.drug_id, "paracetamol-syrup");
        assert_eq!(request.frequency.as_str(), "q6h");
        assert_eq!(request.patient_data.weight, 12.0);
        assert_eq!(session.step(), WizardStep::Result);
    }

    #[tokio::test]
    async fn test_closed_session_refuses_requests() {
        let api = Arc::new(MockDoseApi::with_sample_catalog());
        let session = session_with(api.clone()).await;
        walk_to_review(&session).await;
        session.close();
        session.close();

        assert!(session.is_closed());
        assert_eq!(
            session.submit_calculation().await,
            Err(WizardError::SessionClosed)
        );
        assert_eq!(api.calculate_calls(), 0);
    }

    #[tokio::test]
    async fn test_close_during_catalog_load_clears_loading() {
        let api = Arc::new(MockDoseApi::with_sample_catalog());
        let _gate = api.hold_catalog();
        let session = Arc::new(WizardSession::new(WizardConfig::default(), api));

        let background = session.clone();
        let pending = tokio::spawn(async move { background.load_catalog().await });
        while session.with_wizard(|w| w.catalog_status() != &CatalogStatus::Loading) {
            tokio::task::yield_now().await;
        }
        session.close();

        assert_eq!(pending.await.unwrap(), Err(WizardError::SessionClosed));
        assert_eq!(
            session.with_wizard(|w| w.catalog_status().clone()),
            CatalogStatus::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_stale_cancel_handle_does_not_discard_live_submit() {
        let api = Arc::new(MockDoseApi::with_sample_catalog());
        api.respond_with(Ok(sample_result()));
        let gate = api.hold_calculations();
        let session = Arc::new(session_with(api.clone()).await);
        walk_to_review(&session).await;

        let SubmitStart::Started(stale) = session.wizard().begin_submit().unwrap() else {
            panic!("first submit should start");
        };
        assert_eq!(session.retreat(), WizardStep::Frequency);
        assert_eq!(session.advance().unwrap(), WizardStep::Review);

        let background = session.clone();
        let live = tokio::spawn(async move { background.submit_calculation().await });
        while !session.snapshot().loading {
            tokio::task::yield_now().await;
        }

        // An older request's handle replaces the live one and is then dropped
        let (stale_cancel, _) = oneshot::channel();
        *lock(&session.inflight) = Some((stale.epoch, stale_cancel));
        gate.notify_one();

        assert_eq!(live.await.unwrap().unwrap(), SubmitOutcome::Completed);
        assert_eq!(session.step(), WizardStep::Result);
        assert!(session.snapshot().result.is_some());
    }

    #[tokio::test]
    async fn test_session_identity() {
        let session = WizardSession::new(WizardConfig::default(), Arc::new(MockDoseApi::new()));
        assert_eq!(session.session_id().len(), 36);
        assert!(chrono::DateTime::parse_from_rfc3339(session.started_at()).is_ok());
    }
}
