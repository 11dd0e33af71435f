//! Project Template
//!
//! A minimal two-target Scratch 3 project (a blank stage plus one
//! sprite) bundled as a string constant and parsed once into a
//! `serde_json::Value`, then cloned per pipeline invocation. The
//! lowerer fills in `targets[1].blocks`/`variables`/`lists` and the
//! top-level `extensions` list; everything else is left as-is.

use lazy_static::lazy_static;
use serde_json::Value;

const TEMPLATE_JSON: &str = r#"{
  "targets": [
    {
      "isStage": true,
      "name": "Stage",
      "variables": {},
      "lists": {},
      "broadcasts": {},
      "blocks": {},
      "comments": {},
      "currentCostume": 0,
      "costumes": [
        {
          "name": "backdrop1",
          "assetId": "cd21514d0531fdffb22204e0ec5ed84a",
          "md5ext": "cd21514d0531fdffb22204e0ec5ed84a.svg",
          "dataFormat": "svg",
          "rotationCenterX": 240,
          "rotationCenterY": 180
        }
      ],
      "sounds": [],
      "volume": 100,
      "layerOrder": 0,
      "tempo": 60,
      "videoTransparency": 50,
      "videoState": "on",
      "textToSpeechLanguage": null
    },
    {
      "isStage": false,
      "name": "Sprite1",
      "variables": {},
      "lists": {},
      "broadcasts": {},
      "blocks": {},
      "comments": {},
      "currentCostume": 0,
      "costumes": [
        {
          "name": "costume1",
          "assetId": "bcf454acf8e4e6c0bf3ed9e6a5e8c7c3",
          "md5ext": "bcf454acf8e4e6c0bf3ed9e6a5e8c7c3.svg",
          "dataFormat": "svg",
          "rotationCenterX": 48,
          "rotationCenterY": 50
        }
      ],
      "sounds": [],
      "volume": 100,
      "layerOrder": 1,
      "visible": true,
      "x": 0,
      "y": 0,
      "size": 100,
      "direction": 90,
      "draggable": false,
      "rotationStyle": "all around"
    }
  ],
  "monitors": [],
  "extensions": [],
  "meta": {
    "semver": "3.0.0",
    "vm": "0.2.0",
    "agent": ""
  }
}"#;

lazy_static! {
    static ref TEMPLATE: Value = serde_json::from_str(TEMPLATE_JSON).expect("bundled project template is valid JSON");
}

/// A fresh, independent copy of the template for one compile.
pub fn fresh_project() -> Value {
    TEMPLATE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_a_stage_and_one_sprite() {
        let project = fresh_project();
        let targets = project["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0]["isStage"], true);
        assert_eq!(targets[1]["isStage"], false);
    }

    #[test]
    fn each_call_returns_an_independent_copy() {
        let mut a = fresh_project();
        a["targets"][1]["blocks"]["x"] = Value::String("y".into());
        let b = fresh_project();
        assert!(b["targets"][1]["blocks"].as_object().unwrap().is_empty());
    }
}
