//! RuleEngine - event message to notifications

use serde_json::{Map, Value};
use tracing::debug;

use contracts::RulesConfig;

use crate::message::{is_truthy, value_text, EventKind, EventMessage, Notification};
use crate::RuleError;

pub const SUBJECT_MANIFEST_CREATED: &str = "Manifest Created";
pub const SUBJECT_MANIFEST_CREATED_HMDMC: &str = "Manifest Created (HMDMC)";
pub const SUBJECT_MANIFEST_RECEIVED: &str = "Manifest Received";
pub const SUBJECT_WORK_ORDER_PREFIX: &str = "Work Order";
pub const SUBJECT_CATALOGUE_NEW: &str = "New Catalogue Available";
pub const SUBJECT_CATALOGUE_PROCESSED: &str = "Catalogue Processed";
pub const SUBJECT_CATALOGUE_REJECTED: &str = "Catalogue Rejected";

/// Stateless rule evaluation over a fixed [`RulesConfig`]
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RulesConfig,
}

impl RuleEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Parse a raw payload and evaluate it
    pub fn evaluate_payload(&self, payload: &[u8]) -> Result<Vec<Notification>, RuleError> {
        let message = EventMessage::from_slice(payload)?;
        self.evaluate(&message)
    }

    /// Notifications for one message
    ///
    /// Event types without rules yield an empty list.
    pub fn evaluate(&self, message: &EventMessage) -> Result<Vec<Notification>, RuleError> {
        let Some(kind) = message.kind() else {
            debug!(event_type = %message.event_type, "No rule for event type");
            return Ok(Vec::new());
        };

        debug!(event_type = %message.event_type, ?kind, "Evaluating rule");
        match kind {
            EventKind::ManifestCreated => self.on_manifest_created(message),
            EventKind::ManifestReceived => self.on_manifest_received(message).map(|n| vec![n]),
            EventKind::WorkOrderDispatched | EventKind::WorkOrderConcluded => {
                self.on_work_order(message).map(|n| vec![n])
            }
            EventKind::CatalogueNew => Ok(vec![self.catalogue(
                SUBJECT_CATALOGUE_NEW,
                "catalogue_new",
                Map::new(),
            )]),
            EventKind::CatalogueProcessed => Ok(vec![self.catalogue(
                SUBJECT_CATALOGUE_PROCESSED,
                "catalogue_processed",
                Map::new(),
            )]),
            EventKind::CatalogueRejected => {
                let mut data = Map::new();
                if let Some(error) = message.meta("error") {
                    data.insert("error".into(), error.clone());
                    data.insert("timestamp".into(), message.timestamp.clone());
                }
                Ok(vec![self.catalogue(
                    SUBJECT_CATALOGUE_REJECTED,
                    "catalogue_rejected",
                    data,
                )])
            }
        }
    }

    fn on_manifest_created(&self, message: &EventMessage) -> Result<Vec<Notification>, RuleError> {
        let manifest_id = message.required_meta("manifest_id")?;
        let (to, mut data) = self.manifest_common(message, &manifest_id);
        data.insert(
            "user_identifier".into(),
            message.user_identifier.clone().map_or(Value::Null, Value::String),
        );

        let mut notifications = vec![self.notification(
            format!("{SUBJECT_MANIFEST_CREATED} {manifest_id}"),
            to,
            "manifest_created",
            data.clone(),
        )];

        if let Some(hmdmc) = message.meta("hmdmc") {
            data.insert("hmdmc_list".into(), hmdmc.clone());
            notifications.push(self.notification(
                format!("{SUBJECT_MANIFEST_CREATED_HMDMC} {manifest_id}"),
                vec![self.config.contact.hmdmc_verify.clone()],
                "manifest_created_hmdmc",
                data,
            ));
        }

        Ok(notifications)
    }

    fn on_manifest_received(&self, message: &EventMessage) -> Result<Notification, RuleError> {
        let manifest_id = message.required_meta("manifest_id")?;
        let (to, mut data) = self.manifest_common(message, &manifest_id);

        for key in ["barcode", "created_at", "all_received"] {
            if let Some(value) = message.meta(key) {
                data.insert(key.into(), value.clone());
            }
        }

        Ok(self.notification(
            format!("{SUBJECT_MANIFEST_RECEIVED} {manifest_id}"),
            to,
            "manifest_received",
            data,
        ))
    }

    fn on_work_order(&self, message: &EventMessage) -> Result<Notification, RuleError> {
        let work_order_id = message.required_meta("work_order_id")?;
        let work_plan_id = message.required_info("work_plan_id")?;
        let drs_study_code = message.required_info("drs_study_code")?;
        let user = message
            .user_identifier
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RuleError::missing(&message.event_type, "user_identifier"))?;

        let status = message
            .event_type
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_string();

        let mut data = Map::new();
        data.insert("work_order_id".into(), Value::String(work_order_id.clone()));
        data.insert("link".into(), Value::String(self.work_order_link(&work_plan_id)));
        data.insert("user_identifier".into(), Value::String(user.clone()));
        data.insert("work_order_status".into(), Value::String(status.clone()));

        Ok(self.notification(
            format!(
                "{SUBJECT_WORK_ORDER_PREFIX} {work_order_id} {} [Data release:{drs_study_code}]",
                capitalize(&status)
            ),
            vec![user],
            "wo_event",
            data,
        ))
    }

    /// Recipients and data shared by manifest events
    fn manifest_common(
        &self,
        message: &EventMessage,
        manifest_id: &str,
    ) -> (Vec<String>, Map<String, Value>) {
        let mut to: Vec<String> = message.user_identifier.iter().cloned().collect();
        if let Some(custodian) = message.meta("sample_custodian") {
            to.push(value_text(custodian));
        }
        if let Some(Value::Array(deputies)) = message.meta("deputies") {
            to.extend(deputies.iter().filter(|d| is_truthy(d)).map(value_text));
        }

        let mut data = Map::new();
        data.insert("manifest_id".into(), Value::String(manifest_id.to_string()));
        data.insert("link".into(), Value::String(self.manifest_link(manifest_id)));
        (to, data)
    }

    fn catalogue(&self, subject: &str, template: &str, data: Map<String, Value>) -> Notification {
        self.notification(
            subject.to_string(),
            vec![self.config.contact.dev_team.clone()],
            template,
            data,
        )
    }

    fn notification(
        &self,
        subject: String,
        to: Vec<String>,
        template: &str,
        data: Map<String, Value>,
    ) -> Notification {
        Notification {
            subject,
            from_address: self.config.from_address.clone(),
            to,
            template: template.to_string(),
            data,
        }
    }

    /// `{protocol}://{root}:{port}/{reception_path}/{manifest_id}`
    pub fn manifest_link(&self, manifest_id: &str) -> String {
        let link = &self.config.link;
        format!(
            "{}://{}:{}/{}/{}",
            link.protocol, link.root, link.port, link.reception_path, manifest_id
        )
    }

    /// `{protocol}://{root}:{port}/{begin}/{work_plan_id}/{end}`
    pub fn work_order_link(&self, work_plan_id: &str) -> String {
        let link = &self.config.link;
        format!(
            "{}://{}:{}/{}/{}/{}",
            link.protocol,
            link.root,
            link.port,
            link.work_order_begin,
            work_plan_id,
            link.work_order_end
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
