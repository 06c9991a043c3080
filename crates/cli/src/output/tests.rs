use super::*;

#[test]
fn result_builder_success() {
	let result: CommandResult<String> = ResultBuilder::new("cache key").data("abc".to_string()).build();

	assert!(result.ok);
	assert_eq!(result.command, "cache key");
	assert!(result.error.is_none());
	assert!(result.timings.is_some());
}

#[test]
fn result_builder_error() {
	let result: CommandResult<()> = ResultBuilder::new("validate").error(ErrorCode::InvalidPlan, "action 2: unknown variant").build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::InvalidPlan);
}

#[test]
fn envelope_omits_absent_fields() {
	let result: CommandResult<()> = ResultBuilder::new("validate").error(ErrorCode::InvalidPlan, "bad").build();
	let json = serde_json::to_value(&result).unwrap();

	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "INVALID_PLAN");
	assert!(json.get("data").is_none());
	assert!(json["timings"]["durationMs"].is_u64());
}

#[test]
fn error_code_display_matches_wire_name() {
	for code in [ErrorCode::InvalidPlan, ErrorCode::CacheError, ErrorCode::ConfigError] {
		let wire = serde_json::to_value(code).unwrap();
		assert_eq!(wire, code.to_string());
	}
}
