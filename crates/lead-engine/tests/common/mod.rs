//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use leadroute_engine::prelude::*;

/// Valid B2C intake payload
pub fn b2c(mobile: &str, profile: ProfileType) -> NewEnquiry {
    NewEnquiry {
        name: Some("Test Customer".to_string()),
        mobile: mobile.to_string(),
        lead_type: Some(LeadType::B2c),
        capacity: Some(5.0),
        category: Some("Residential".to_string()),
        profile: Some(profile),
        source: Some("web".to_string()),
        city: Some("Pune".to_string()),
        ..Default::default()
    }
}

/// Valid B2B intake payload
pub fn b2b(mobile: &str, profile: ProfileType) -> NewEnquiry {
    NewEnquiry {
        mobile: mobile.to_string(),
        lead_type: Some(LeadType::B2b),
        business_model: Some("EPC".to_string()),
        company_name: Some("Sunrise Infra".to_string()),
        profile: Some(profile),
        ..Default::default()
    }
}

/// Distinct ten-digit mobile number for the n-th enquiry
pub fn mobile(n: usize) -> String {
    format!("9{:09}", n)
}

/// Audit sink that can be switched to refuse every write
#[derive(Default)]
pub struct FlakyAuditSink {
    inner: MemoryAuditLog,
    failing: AtomicBool,
}

impl FlakyAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl AuditSink for FlakyAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.append_batch(std::slice::from_ref(record)).await
    }

    async fn append_batch(&self, records: &[AuditRecord]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LeadError::audit("audit store unavailable"));
        }
        self.inner.append_batch(records).await
    }

    async fn trail(&self, enquiry_id: EnquiryId) -> Result<Vec<AuditRecord>> {
        self.inner.trail(enquiry_id).await
    }
}

/// Rule repository that counts how often the pipeline asks for rules
pub struct CountingRules {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
}

impl CountingRules {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleRepository for CountingRules {
    async fn active_rules_by_priority_desc(&self) -> Result<Vec<AssignmentRule>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.active_rules_by_priority_desc().await
    }
}

/// Rule repository that always fails
pub struct BrokenRules;

#[async_trait]
impl RuleRepository for BrokenRules {
    async fn active_rules_by_priority_desc(&self) -> Result<Vec<AssignmentRule>> {
        Err(LeadError::internal("rule store offline"))
    }
}

/// Notification sender that always fails
pub struct BrokenNotifier;

#[async_trait]
impl NotificationSender for BrokenNotifier {
    async fn notify(&self, _handler: &HandlerId, _enquiry: &Enquiry) -> Result<()> {
        Err(LeadError::notification("sms gateway down"))
    }
}

pub fn memory_engine(store: &Arc<MemoryStore>) -> LeadEngine {
    LeadEngine::new(EngineConfig::default(), Collaborators::memory(store.clone())).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
