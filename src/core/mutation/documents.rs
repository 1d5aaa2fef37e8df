//! GraphQL mutation documents.

/// Mutations the processor issues against the call store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateCall,
    UpdateCallStatus,
    AddTranscriptSegment,
    AddCallCategory,
    UpdateCallAggregation,
    UpdateAgent,
    UpdateRecordingUrl,
}

impl MutationKind {
    /// Response field the mutation's result is returned under.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::CreateCall => "createCall",
            Self::UpdateCallStatus => "updateCallStatus",
            Self::AddTranscriptSegment => "addTranscriptSegment",
            Self::AddCallCategory => "addCallCategory",
            Self::UpdateCallAggregation => "updateCallAggregation",
            Self::UpdateAgent => "updateAgent",
            Self::UpdateRecordingUrl => "updateRecordingUrl",
        }
    }

    pub fn document(&self) -> &'static str {
        match self {
            Self::CreateCall => CREATE_CALL,
            Self::UpdateCallStatus => UPDATE_CALL_STATUS,
            Self::AddTranscriptSegment => ADD_TRANSCRIPT_SEGMENT,
            Self::AddCallCategory => ADD_CALL_CATEGORY,
            Self::UpdateCallAggregation => UPDATE_CALL_AGGREGATION,
            Self::UpdateAgent => UPDATE_AGENT,
            Self::UpdateRecordingUrl => UPDATE_RECORDING_URL,
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

const CREATE_CALL: &str = r#"mutation CreateCall($input: CreateCallInput!) {
  createCall(input: $input) { CallId Status CreatedAt UpdatedAt }
}"#;

const UPDATE_CALL_STATUS: &str = r#"mutation UpdateCallStatus($input: UpdateCallStatusInput!) {
  updateCallStatus(input: $input) { CallId Status CreatedAt UpdatedAt }
}"#;

const ADD_TRANSCRIPT_SEGMENT: &str = r#"mutation AddTranscriptSegment($input: AddTranscriptSegmentInput!) {
  addTranscriptSegment(input: $input) {
    CallId Channel SegmentId StartTime EndTime Transcript IsPartial
    Sentiment SentimentWeighted CreatedAt UpdatedAt Status
  }
}"#;

const ADD_CALL_CATEGORY: &str = r#"mutation AddCallCategory($input: AddCallCategoryInput!) {
  addCallCategory(input: $input) { CallId }
}"#;

const UPDATE_CALL_AGGREGATION: &str = r#"mutation UpdateCallAggregation($input: UpdateCallAggregationInput!) {
  updateCallAggregation(input: $input) { CallId }
}"#;

const UPDATE_AGENT: &str = r#"mutation UpdateAgent($input: UpdateAgentInput!) {
  updateAgent(input: $input) { CallId AgentId }
}"#;

const UPDATE_RECORDING_URL: &str = r#"mutation UpdateRecordingUrl($input: UpdateRecordingUrlInput!) {
  updateRecordingUrl(input: $input) { CallId RecordingUrl }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_select_their_field() {
        for kind in [
            MutationKind::CreateCall,
            MutationKind::UpdateCallStatus,
            MutationKind::AddTranscriptSegment,
            MutationKind::AddCallCategory,
            MutationKind::UpdateCallAggregation,
            MutationKind::UpdateAgent,
            MutationKind::UpdateRecordingUrl,
        ] {
            assert!(kind.document().contains(&format!("{}(input: $input)", kind.field_name())));
        }
    }
}
