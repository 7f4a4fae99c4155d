use scraperuntime::{StepContext, StepError, StepOutputs};

/// POST the payload to the caller-provided endpoint. Structured JSON is
/// sent as JSON; anything else goes out as a plain text body.
pub(crate) async fn via_webhook(
    http: &reqwest::Client,
    step: StepContext<'_>,
) -> Result<StepOutputs, StepError> {
    let target = step.require_input("Target URL")?;
    let body = step.require_input("Body")?;

    let request = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => http.post(target).json(&json),
        Err(_) => http.post(target).body(body.to_string()),
    };

    let response = request
        .send()
        .await
        .map_err(|e| StepError::Failed(format!("webhook delivery failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StepError::Failed(format!("webhook returned {status}")));
    }

    step.logs.info(format!("Delivered to {target} ({status})"));
    Ok(StepOutputs::new())
}
