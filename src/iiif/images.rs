// src/iiif/images.rs
// =============================================================================
// Builds IIIF Image API request URLs from a manifest's canvases.
//
// This is pure string work on an already-fetched manifest body:
// - v2 manifests: sequences -> canvases -> images -> resource (@id, or the
//   resource's image service @id)
// - v3 manifests: items (canvases) -> items (annotation pages) -> items
//   (annotations) -> body (id, or the body's image service)
//
// Each extracted image-service base is formatted as
//   {base}/full/{size}/0/default.{format}
// where size is "!w,h" (best fit), "w,h" (exact), or "max"/"full".
// =============================================================================

use serde_json::Value;

use super::document::IiifVersion;

/// Sizing/format options for the generated image URLs.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub width: u32,
    pub height: u32,
    /// File extension, e.g. "jpg" or "png"
    pub format: String,
    /// Exact dimensions instead of best-fit within them
    pub exact: bool,
    /// Ask the server for its maximum size ("max" on v3, "full" on v2)
    pub use_max: bool,
}

impl Default for ImageRequest {
    fn default() -> Self {
        ImageRequest {
            width: 768,
            height: 2000,
            format: "jpg".to_string(),
            exact: false,
            use_max: false,
        }
    }
}

/// Extracts image URLs from a manifest body, formatted per `request`.
///
/// Manifests of an unrecognizable version, and canvases without usable
/// image ids, simply contribute nothing - this function never fails.
pub fn manifest_image_urls(manifest: &Value, request: &ImageRequest) -> Vec<String> {
    let Some(version) = super::document::detect_version(manifest) else {
        return Vec::new();
    };

    let ids = match version {
        IiifVersion::V2 => v2_image_ids(manifest),
        IiifVersion::V3 => v3_image_ids(manifest),
    };

    ids.iter()
        .map(|id| format_image_url(id, version, request))
        .collect()
}

// v2: sequences[0].canvases[].images[].resource
fn v2_image_ids(manifest: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    let canvases = manifest
        .get("sequences")
        .and_then(Value::as_array)
        .and_then(|seqs| seqs.first())
        .and_then(|seq| seq.get("canvases"))
        .and_then(Value::as_array);

    let Some(canvases) = canvases else {
        return ids;
    };

    for canvas in canvases {
        let Some(images) = canvas.get("images").and_then(Value::as_array) else {
            continue;
        };
        for image in images {
            let Some(resource) = image.get("resource") else {
                continue;
            };
            // Prefer the resource's own @id (it is the rendered image URL,
            // which service_base trims back to the service root); fall
            // back to the attached image service
            let id = resource
                .get("@id")
                .and_then(Value::as_str)
                .map(service_base)
                .or_else(|| {
                    resource
                        .get("service")
                        .and_then(|s| s.get("@id"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
            if let Some(id) = id {
                ids.push(id);
            }
        }
    }
    ids
}

// v3: items[].items[].items[].body
fn v3_image_ids(manifest: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    let Some(canvases) = manifest.get("items").and_then(Value::as_array) else {
        return ids;
    };

    for canvas in canvases {
        let pages = canvas.get("items").and_then(Value::as_array);
        for page in pages.into_iter().flatten() {
            let annotations = page.get("items").and_then(Value::as_array);
            for annotation in annotations.into_iter().flatten() {
                let Some(body) = annotation.get("body") else {
                    continue;
                };
                let id = body
                    .get("id")
                    .and_then(Value::as_str)
                    .map(service_base)
                    .or_else(|| {
                        // service may be a list or a single object
                        let service = body.get("service")?;
                        let service = match service {
                            Value::Array(items) => items.first()?,
                            other => other,
                        };
                        service
                            .get("@id")
                            .or_else(|| service.get("id"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    });
                if let Some(id) = id {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

// A body/resource id is often a fully rendered request like
// {base}/full/!200,200/0/default.jpg - trim it back to the service base
fn service_base(id: &str) -> String {
    let id = match id.split_once("/full/") {
        Some((base, _)) => base,
        None => id,
    };
    id.trim_end_matches("/info.json").to_string()
}

fn format_image_url(id: &str, version: IiifVersion, request: &ImageRequest) -> String {
    let size = if request.use_max {
        match version {
            IiifVersion::V2 => "full".to_string(),
            IiifVersion::V3 => "max".to_string(),
        }
    } else if request.exact {
        format!("{},{}", request.width, request.height)
    } else {
        format!("!{},{}", request.width, request.height)
    };
    format!("{}/full/{}/0/default.{}", id, size, request.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v3_manifest(body: Value) -> Value {
        json!({
            "@context": "http://iiif.io/api/presentation/3/context.json",
            "id": "https://example.org/manifest",
            "type": "Manifest",
            "items": [{
                "id": "https://example.org/canvas/1",
                "type": "Canvas",
                "items": [{
                    "id": "https://example.org/page/1",
                    "type": "AnnotationPage",
                    "items": [{
                        "id": "https://example.org/anno/1",
                        "type": "Annotation",
                        "body": body
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_v3_body_id_is_trimmed_and_formatted() {
        let manifest = v3_manifest(json!({
            "id": "https://images.example.org/iiif/abc/full/!200,200/0/default.jpg",
            "type": "Image"
        }));
        let urls = manifest_image_urls(&manifest, &ImageRequest::default());
        assert_eq!(
            urls,
            vec!["https://images.example.org/iiif/abc/full/!768,2000/0/default.jpg"]
        );
    }

    #[test]
    fn test_v3_falls_back_to_service_list() {
        let manifest = v3_manifest(json!({
            "type": "Image",
            "service": [{"id": "https://images.example.org/iiif/abc"}]
        }));
        let urls = manifest_image_urls(&manifest, &ImageRequest::default());
        assert_eq!(
            urls,
            vec!["https://images.example.org/iiif/abc/full/!768,2000/0/default.jpg"]
        );
    }

    #[test]
    fn test_v2_resource_and_size_keyword() {
        let manifest = json!({
            "@context": "http://iiif.io/api/presentation/2/context.json",
            "@id": "https://example.org/manifest",
            "@type": "sc:Manifest",
            "sequences": [{
                "canvases": [{
                    "images": [{
                        "resource": {
                            "@id": "https://images.example.org/iiif/xyz/full/full/0/default.jpg",
                            "service": {"@id": "https://images.example.org/iiif/xyz"}
                        }
                    }]
                }]
            }]
        });

        let max = ImageRequest {
            use_max: true,
            ..ImageRequest::default()
        };
        // v2 spells "maximum size" as full, not max
        assert_eq!(
            manifest_image_urls(&manifest, &max),
            vec!["https://images.example.org/iiif/xyz/full/full/0/default.jpg"]
        );

        let exact = ImageRequest {
            exact: true,
            width: 100,
            height: 200,
            ..ImageRequest::default()
        };
        assert_eq!(
            manifest_image_urls(&manifest, &exact),
            vec!["https://images.example.org/iiif/xyz/full/100,200/0/default.jpg"]
        );
    }

    #[test]
    fn test_unrecognizable_manifest_yields_nothing() {
        let urls = manifest_image_urls(&json!({"foo": "bar"}), &ImageRequest::default());
        assert!(urls.is_empty());
    }

    #[test]
    fn test_canvas_without_images_contributes_nothing() {
        let manifest = json!({
            "@context": "http://iiif.io/api/presentation/3/context.json",
            "id": "https://example.org/manifest",
            "type": "Manifest",
            "items": [{"id": "https://example.org/canvas/1", "type": "Canvas"}]
        });
        assert!(manifest_image_urls(&manifest, &ImageRequest::default()).is_empty());
    }
}
