//! Response formatting.
//!
//! The worker-side payload carries bookkeeping (`summary`, `preprocessing`,
//! `crop_info`, `decode_source`, `processed_image`, envelopes) that the API
//! strips down to the public shape. Formatting is a pure projection:
//! applying it twice equals applying it once.

use serde_json::{json, Value};

/// Project a stored payload onto the public result shape.
///
/// Payloads without `scan_metadata` (failure payloads, legacy rows) pass
/// through untouched.
pub fn format_api_response(result: &Value) -> Value {
    if result.get("scan_metadata").is_none() {
        return result.clone();
    }

    let objects: Vec<Value> = result["detected_objects"]
        .as_array()
        .map(|objects| {
            objects
                .iter()
                .map(|obj| {
                    json!({
                        "object_id": obj.get("object_id"),
                        "class": obj.get("class"),
                        "confidence": obj.get("confidence"),
                        "bounding_box": {
                            "x": obj.pointer("/bounding_box/x"),
                            "y": obj.pointer("/bounding_box/y"),
                            "width": obj.pointer("/bounding_box/width"),
                            "height": obj.pointer("/bounding_box/height"),
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let qr_codes: Vec<Value> = result["qr_codes"]
        .as_array()
        .map(|qrs| {
            qrs.iter()
                .map(|qr| {
                    json!({
                        "qr_id": qr.get("qr_id"),
                        "content": qr.get("content"),
                        "position": {
                            "x": qr.pointer("/position/x"),
                            "y": qr.pointer("/position/y"),
                        },
                        "confidence": qr.get("confidence"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "scan_metadata": {
            "timestamp": result.pointer("/scan_metadata/timestamp"),
            "image_resolution": result.pointer("/scan_metadata/image_resolution"),
            "processing_time_ms": result.pointer("/scan_metadata/processing_time_ms"),
        },
        "detected_objects": objects,
        "qr_codes": qr_codes,
    })
}
