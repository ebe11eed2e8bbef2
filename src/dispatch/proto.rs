//! Wire messages of the `calc.Calculator` service plus the generated
//! server and client stubs.

/// Ask for the next task. Carries no fields.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskRequest {}

/// A claimed task, or all-empty when nothing is pending.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskResponse {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub arg1: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub arg2: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub operation: ::prost::alloc::string::String,
    /// Whole expression to evaluate when `operation` is empty.
    #[prost(string, tag = "5")]
    pub expression: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultRequest {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(double, tag = "2")]
    pub result: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

include!(concat!(env!("OUT_DIR"), "/calc.Calculator.rs"));

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn empty_response_encodes_to_nothing() {
        assert!(TaskResponse::default().encode_to_vec().is_empty());
    }

    #[test]
    fn older_readers_skip_the_expression_field() {
        #[derive(Clone, PartialEq, ::prost::Message)]
        struct LegacyTaskResponse {
            #[prost(string, tag = "1")]
            id: String,
            #[prost(string, tag = "4")]
            operation: String,
        }

        let bytes = TaskResponse {
            id: "task_1".into(),
            expression: "1+2*3".into(),
            ..Default::default()
        }
        .encode_to_vec();
        let legacy = LegacyTaskResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(legacy.id, "task_1");
        assert_eq!(legacy.operation, "");
    }
}
