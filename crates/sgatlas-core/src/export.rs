use crate::model::AtlasLayout;
use serde_json::{Value, json};

fn meta<K>(layout: &AtlasLayout<K>, image: &str) -> Value {
    json!({
        "app": "sgatlas",
        "version": env!("CARGO_PKG_VERSION"),
        "image": image,
        "format": "RGBA8888",
        "size": {"w": layout.width, "h": layout.height},
    })
}

fn frame_value(frame: &crate::model::Rect, origin: (i32, i32)) -> (Value, Value) {
    (
        json!({"x": frame.x, "y": frame.y, "w": frame.w, "h": frame.h}),
        json!({"x": origin.0, "y": origin.1}),
    )
}

/// Serialize the layout as `{ frames: [ { key, frame, origin } ], meta }`, keeping frame order.
pub fn to_json_array<K: ToString>(layout: &AtlasLayout<K>, image: &str) -> Value {
    let frames: Vec<Value> = layout
        .frames
        .iter()
        .map(|fr| {
            let (frame, origin) = frame_value(&fr.frame, fr.origin);
            json!({
                "key": fr.key.to_string(),
                "frame": frame,
                "origin": origin,
            })
        })
        .collect();
    json!({"frames": frames, "meta": meta(layout, image)})
}

/// Flatten frames keyed by name.
/// Shape: `{ frames: { name: { frame, origin, sourceSize } }, meta }`.
pub fn to_json_hash<K: ToString>(layout: &AtlasLayout<K>, image: &str) -> Value {
    let mut frames = serde_json::Map::new();
    for fr in &layout.frames {
        let (frame, origin) = frame_value(&fr.frame, fr.origin);
        frames.insert(
            fr.key.to_string(),
            json!({
                "frame": frame,
                "origin": origin,
                "sourceSize": {"w": fr.frame.w, "h": fr.frame.h},
            }),
        );
    }
    json!({ "frames": frames, "meta": meta(layout, image) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frame, Rect};

    fn layout() -> AtlasLayout {
        AtlasLayout {
            width: 5,
            height: 3,
            frames: vec![
                Frame {
                    key: "c3.2".to_string(),
                    frame: Rect::new(0, 0, 2, 3),
                    origin: (1, 2),
                },
                Frame {
                    key: "c3.1".to_string(),
                    frame: Rect::new(2, 0, 3, 1),
                    origin: (0, 0),
                },
            ],
        }
    }

    #[test]
    fn array_keeps_frame_order() {
        let v = to_json_array(&layout(), "atlas.png");
        assert_eq!(v["frames"][0]["key"], "c3.2");
        assert_eq!(v["frames"][1]["frame"]["x"], 2);
        assert_eq!(v["frames"][0]["origin"]["y"], 2);
        assert_eq!(v["meta"]["size"]["w"], 5);
    }

    #[test]
    fn hash_is_keyed_by_name() {
        let v = to_json_hash(&layout(), "atlas.png");
        assert_eq!(v["frames"]["c3.1"]["sourceSize"]["w"], 3);
        assert_eq!(v["meta"]["image"], "atlas.png");
    }
}
