use serde_json::json;

/// JSON Schema of the frames pushed on both streaming endpoints.
pub fn event_schema() -> serde_json::Value {
    let ts = json!({"type": "string"});
    json!({
      "$schema": "http://json-schema.org/draft-07/schema#",
      "title": "SentinelEventFrame",
      "type": "object",
      "required": ["type"],
      "oneOf": [
        {
          "properties": {
            "type": {"const": "status"},
            "message": {"type": "string"},
            "timestamp": ts,
            "step": {"type": "string"}
          },
          "required": ["message", "timestamp", "step"]
        },
        {
          "properties": {
            "type": {"const": "step_start"},
            "step": {"type": "string"},
            "message": {"type": "string"},
            "timestamp": ts,
            "stepNumber": {"type": "integer", "minimum": 1},
            "totalSteps": {"type": "integer", "minimum": 1},
            "progress": {"type": "integer", "minimum": 0, "maximum": 100}
          },
          "required": ["step", "message", "timestamp", "stepNumber", "totalSteps", "progress"]
        },
        {
          "properties": {
            "type": {"const": "threat-detected"},
            "threat_type": {"type": "string"},
            "severity": {"type": "integer", "minimum": 1, "maximum": 10},
            "description": {"type": "string"},
            "affectedSystems": {"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 4},
            "aiRiskScore": {"type": "number", "minimum": 0.7, "maximum": 1.0},
            "confidence_score": {"type": "number", "minimum": 0.8, "maximum": 1.0},
            "threat_id": {"type": "string"},
            "vendor_name": {"type": "string"},
            "detection_method": {"type": "string"},
            "recommendations": {"type": "array", "items": {"type": "string"}, "maxItems": 6}
          },
          "required": ["threat_type", "severity", "description", "affectedSystems", "aiRiskScore",
                       "confidence_score", "threat_id", "vendor_name", "recommendations"]
        },
        {
          "properties": {
            "type": {"const": "step_complete"},
            "step": {"type": "string"},
            "duration": {"type": "integer", "minimum": 0},
            "cost": {"type": "number", "minimum": 0},
            "total_cost": {"type": "number", "minimum": 0},
            "progress": {"type": "integer", "minimum": 0, "maximum": 100},
            "timestamp": ts
          },
          "required": ["step", "duration", "cost", "total_cost", "timestamp"]
        },
        {
          "properties": {
            "type": {"const": "analysis_complete"},
            "message": {"type": "string"},
            "timestamp": ts,
            "results": {"type": "object"}
          },
          "required": ["message", "timestamp", "results"]
        },
        {
          "properties": {
            "type": {"const": "graph_initial"},
            "timestamp": ts,
            "graph_data": {"type": "object"}
          },
          "required": ["timestamp", "graph_data"]
        },
        {
          "properties": {
            "type": {"const": "graph_update"},
            "timestamp": ts,
            "step": {"type": "string"},
            "graph_data": {"type": "object"},
            "changes": {"type": "object"},
            "progress": {"type": "integer", "minimum": 0, "maximum": 100}
          },
          "required": ["timestamp", "graph_data"]
        },
        {
          "properties": {
            "type": {"const": "graph_complete"},
            "message": {"type": "string"},
            "timestamp": ts,
            "summary": {"type": "object"},
            "graph_data": {"type": "object"}
          },
          "required": ["message", "timestamp", "summary"]
        },
        {
          "properties": {
            "type": {"const": "error"},
            "message": {"type": "string"},
            "error": {"type": "string"},
            "timestamp": ts
          },
          "required": ["message", "error", "timestamp"]
        },
        {
          "properties": {"type": {"const": "end"}},
          "required": ["type"]
        }
      ]
    })
}
