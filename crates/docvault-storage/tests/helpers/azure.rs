use docvault_core::AzureSettings;
use docvault_storage::{AzureBlobStorage, Location};
use mockito::{Matcher, Mock, ServerGuard};

pub const ACCOUNT: &str = "devstoreaccount1";
pub const ACCOUNT_KEY: &str = "c2VjcmV0LWFjY291bnQta2V5";
pub const CONTAINER: &str = "fineract-docs";

/// Settings pointing the backend at the mock server.
pub fn settings(server: &ServerGuard) -> AzureSettings {
    AzureSettings::new(ACCOUNT, ACCOUNT_KEY, CONTAINER).with_endpoint(server.url())
}

/// Mock the Create Container call with the given status and optional `x-ms-error-code`.
pub async fn mock_create_container(
    server: &mut ServerGuard,
    status: usize,
    error_code: Option<&str>,
) -> Mock {
    let mut mock = server
        .mock("PUT", format!("/{}", CONTAINER).as_str())
        .match_query(Matcher::UrlEncoded(
            "restype".to_string(),
            "container".to_string(),
        ))
        .match_header(
            "authorization",
            Matcher::Regex(format!("^SharedKey {}:", ACCOUNT)),
        )
        .match_header("x-ms-version", Matcher::Any)
        .with_status(status);

    if let Some(code) = error_code {
        mock = mock.with_header("x-ms-error-code", code);
    }

    mock.create_async().await
}

/// Backend constructed against a freshly "created" container.
pub async fn ready_backend(server: &mut ServerGuard) -> AzureBlobStorage {
    mock_create_container(server, 201, None).await;
    AzureBlobStorage::new(&settings(server))
        .await
        .expect("Failed to construct Azure backend")
}

/// Request path addressed by a location returned from the backend.
pub fn request_path(server: &ServerGuard, location: &Location) -> String {
    location
        .as_str()
        .strip_prefix(server.url().as_str())
        .expect("location does not point at the mock server")
        .to_string()
}
