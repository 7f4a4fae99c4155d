//! Content extraction: CSS-selector text extraction and AI-assisted
//! structured extraction.

use crate::{clean_selector, single, AiConfig};
use scraper::{Html, Selector};
use scraperuntime::{StepContext, StepError, StepOutputs};

pub(crate) fn extract_text(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let html = step.require_input("Html")?;
    let raw = step.require_input("Selector")?;
    let selector = clean_selector(raw);
    if selector != raw {
        step.logs
            .info(format!("Adjusted selector \"{raw}\" to \"{selector}\""));
    }

    let parsed = Selector::parse(&selector)
        .map_err(|_| StepError::Failed(format!("invalid selector: {selector}")))?;
    let document = Html::parse_document(html);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| StepError::Failed(format!("no element matches selector: {selector}")))?;

    let text = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return Err(StepError::Failed(format!(
            "element matching {selector} has no text"
        )));
    }

    step.logs.info(format!("Extracted {} characters", text.len()));
    Ok(single("Extracted text", text))
}

pub(crate) async fn extract_with_ai(
    http: &reqwest::Client,
    ai: &AiConfig,
    step: StepContext<'_>,
) -> Result<StepOutputs, StepError> {
    let content = step.require_input("Content")?;
    let prompt = step.require_input("Prompt")?;
    let api_key = lookup_credential(&step).await?;

    step.logs.info("Starting AI extraction");
    let extracted = chat_completion(
        http,
        ai,
        &api_key,
        "You are a data extraction assistant. Extract information according to the user prompt.",
        &format!("Content:\n{content}\n\nExtraction prompt: {prompt}"),
    )
    .await?;

    step.logs.success("AI extraction completed");
    Ok(single("Extracted data", extracted))
}

pub(crate) async fn translate_text(
    http: &reqwest::Client,
    ai: &AiConfig,
    step: StepContext<'_>,
) -> Result<StepOutputs, StepError> {
    let text = step.require_input("Text")?;
    let language = step.require_input("Target language")?;
    let api_key = lookup_credential(&step).await?;

    step.logs.info(format!("Translating into {language}"));
    let translated = chat_completion(
        http,
        ai,
        &api_key,
        "You are a translation assistant. Reply with the translated text only.",
        &format!("Translate into {language}:\n{text}"),
    )
    .await?;

    step.logs.success("Translation completed");
    Ok(single("Translated text", translated))
}

async fn lookup_credential(step: &StepContext<'_>) -> Result<String, StepError> {
    let credential = step.require_input("Credentials")?;
    step.credentials
        .get(credential)
        .await
        .ok_or_else(|| StepError::MissingCredential(credential.to_string()))
}

async fn chat_completion(
    http: &reqwest::Client,
    ai: &AiConfig,
    api_key: &str,
    system: &str,
    user: &str,
) -> Result<String, StepError> {
    let body = serde_json::json!({
        "model": ai.model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "temperature": 0.3,
    });

    let response = http
        .post(&ai.endpoint)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| StepError::Failed(format!("AI request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(StepError::Failed(format!(
            "AI API error: {}",
            response.status()
        )));
    }

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| StepError::Failed(format!("AI response was not JSON: {e}")))?;
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StepError::Failed("AI response had no content".to_string()))
}
