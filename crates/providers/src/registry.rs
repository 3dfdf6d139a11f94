//! Holds the instantiated STT/LLM/TTS provider clients for one gateway
//! process, looked up by the provider id each agent config references.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{LlmProvider, SttProvider, TtsProvider};

pub struct ProviderRegistry {
    stt: HashMap<String, Arc<dyn SttProvider>>,
    llm: HashMap<String, Arc<dyn LlmProvider>>,
    tts: HashMap<String, Arc<dyn TtsProvider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            stt: HashMap::new(),
            llm: HashMap::new(),
            tts: HashMap::new(),
        }
    }

    pub fn register_stt(&mut self, id: impl Into<String>, provider: Arc<dyn SttProvider>) {
        self.stt.insert(id.into(), provider);
    }

    pub fn register_llm(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.llm.insert(id.into(), provider);
    }

    pub fn register_tts(&mut self, id: impl Into<String>, provider: Arc<dyn TtsProvider>) {
        self.tts.insert(id.into(), provider);
    }

    pub fn stt(&self, id: &str) -> Option<Arc<dyn SttProvider>> {
        self.stt.get(id).cloned()
    }

    pub fn llm(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.llm.get(id).cloned()
    }

    pub fn tts(&self, id: &str) -> Option<Arc<dyn TtsProvider>> {
        self.tts.get(id).cloned()
    }

    pub fn llm_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.llm.keys().cloned().collect();
        ids.sort();
        ids
    }
}
