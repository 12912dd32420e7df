//! Imaging network study list (DICOM metadata over REST)

use super::feed::{
    endpoint, optional_str, optional_u32, parse_date, required_str, since, ResourceFeed,
};
use super::SyncContext;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{ImagingStudy, IntegrationId, IntegrationType, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

/// Maximum length of a DICOM UID (PS3.5 §9.1)
const MAX_UID_LEN: usize = 64;

pub struct ImagingFeed;

#[async_trait]
impl ResourceFeed for ImagingFeed {
    type Record = ImagingStudy;

    const INTEGRATION_TYPE: IntegrationType = IntegrationType::Imaging;
    const LABEL: &'static str = "Imaging";
    const LIST_FIELD: &'static str = "studies";
    const ID_FIELD: &'static str = "studyInstanceUid";

    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder {
        let request = ctx.client.get(&endpoint(ctx, "studies"));
        match since(ctx) {
            Some(since) => request.query(&[("since", since)]),
            None => request,
        }
    }

    fn map(
        &self,
        integration_id: &IntegrationId,
        item: &Value,
    ) -> std::result::Result<ImagingStudy, String> {
        let uid = required_str(item, "studyInstanceUid")?;
        validate_dicom_uid(&uid)?;
        let study_date = parse_date(&required_str(item, "studyDate")?, "%Y%m%d", "studyDate")?;

        Ok(ImagingStudy {
            integration_id: integration_id.clone(),
            provider_record_id: uid,
            patient_id: required_str(item, "patientId")?,
            modality: required_str(item, "modality")?.to_ascii_uppercase(),
            description: optional_str(item, "studyDescription"),
            study_date,
            accession_number: optional_str(item, "accessionNumber"),
            number_of_instances: optional_u32(item, "numberOfInstances")?.unwrap_or(0),
            report_status: optional_str(item, "reportStatus"),
        })
    }

    async fn persist(&self, sink: &dyn RecordSink, record: &ImagingStudy) -> Result<UpsertOutcome> {
        sink.upsert_imaging_study(record).await
    }
}

/// Dot-separated numeric components, no leading zeros, at most 64 chars
fn validate_dicom_uid(uid: &str) -> std::result::Result<(), String> {
    let valid = uid.len() <= MAX_UID_LEN
        && uid.split('.').all(|component| {
            !component.is_empty()
                && component.bytes().all(|b| b.is_ascii_digit())
                && (component == "0" || !component.starts_with('0'))
        });
    if valid {
        Ok(())
    } else {
        Err(format!("'{uid}' is not a valid DICOM UID"))
    }
}
