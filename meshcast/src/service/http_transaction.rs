/// The object a GET handler receives (spec.md §4.9): read the route, set
/// the response `Content-Type`, and write a body.
pub struct Transaction {
    route: String,
    content_type: String,
    body: Vec<u8>,
    sent: bool,
}

impl Transaction {
    pub(crate) fn new(route: impl Into<String>) -> Self {
        Transaction {
            route: route.into(),
            content_type: "text/plain".to_owned(),
            body: Vec::new(),
            sent: false,
        }
    }

    /// The request's route path, e.g. `"/"` or `"/status"`.
    pub fn get_route(&self) -> &str {
        &self.route
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    pub(crate) fn content_type(&self) -> &str {
        &self.content_type
    }

    pub(crate) fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Whether a handler has called [`send`] on this transaction. A route
    /// whose handler runs but never sends is treated as unknown (spec.md
    /// §6: unknown GET route returns `400`).
    pub(crate) fn sent(&self) -> bool {
        self.sent
    }
}

/// Write `body` into `transaction`, per spec.md §4.9's `send(transaction, body)`.
pub fn send(transaction: &mut Transaction, body: impl Into<Vec<u8>>) {
    transaction.body = body.into();
    transaction.sent = true;
}
