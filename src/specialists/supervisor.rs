//! General-purpose specialist that answers directly.

use std::sync::Arc;

use crate::adapters::LanguageModel;

use super::respond_or_fallback;

pub struct Supervisor {
    llm: Arc<dyn LanguageModel>,
}

impl Supervisor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Answer `task` with a single model call
    pub async fn respond(&self, task: &str) -> String {
        respond_or_fallback(self.llm.as_ref(), task).await
    }
}
