use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

pub async fn post_form<T: DeserializeOwned, B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    form: &B,
) -> Result<T> {
    let response = client.post(url).form(form).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("Request failed with status {}: {}", status, text);
    }

    Ok(response.json().await?)
}

pub async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    headers: &[(&str, String)],
) -> Result<()> {
    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, value);
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("Request failed with status {}: {}", status, text);
    }

    Ok(())
}
