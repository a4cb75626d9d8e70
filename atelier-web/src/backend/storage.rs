use super::client::BackendClient;

pub struct StorageApi<'a> {
    client: &'a BackendClient,
}

impl<'a> StorageApi<'a> {
    pub(crate) fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    /// Public URL of an object in a public bucket. No request is made.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        let mut segments = vec!["storage", "v1", "object", "public", bucket];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.client.url(&segments).to_string()
    }
}
