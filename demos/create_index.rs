use esadmin_http::{ClientConfig, RequestExecutor, RequestSpec, RetryableClient, TransportOptions};

fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().map_err(anyhow::Error::msg)?;
    let index = std::env::args().nth(1).unwrap_or_else(|| "logs".to_owned());

    let client = RetryableClient::new(&TransportOptions::default())?;
    let executor = RequestExecutor::new(client)?;

    let response = executor.execute(
        &config,
        RequestSpec::put(format!("/{index}"))
            .with_body(r#"{"settings":{"number_of_shards":1}}"#),
    )?;

    match response.error_type() {
        Some("resource_already_exists_exception") => println!("{index} already exists"),
        Some(other) => println!("{index} not created: {other}"),
        None => println!("{index}: HTTP {} {:?}", response.status, response.data),
    }

    Ok(())
}
