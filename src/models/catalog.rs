use serde::Serialize;

/// Where the pretrained architectures are published; `{}` is the archive stem.
pub const ARCH_URL_TEMPLATE: &str =
    "http://download.tensorflow.org/models/object_detection/tf2/20200711/{}.tar.gz";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelType {
    /// Name used for bundled defaults and templates.
    pub name: &'static str,
    /// Archive stem of the pretrained checkpoint.
    pub arch: &'static str,
    pub description: &'static str,
}

const MODEL_TYPES: &[ModelType] = &[
    ModelType {
        name: "ssd_mobilenet_v2_fpnlite",
        arch: "ssd_mobilenet_v2_fpnlite_320x320_coco17_tpu-8",
        description: "SSD MobileNet v2 FPNLite 320x320",
    },
    ModelType {
        name: "efficientdet_d0",
        arch: "efficientdet_d0_coco17_tpu-32",
        description: "EfficientDet D0 512x512",
    },
];

pub fn model_types() -> &'static [ModelType] {
    MODEL_TYPES
}

pub fn lookup(name: &str) -> Option<&'static ModelType> {
    MODEL_TYPES.iter().find(|model| model.name == name)
}

#[must_use]
pub fn arch_url(arch: &str) -> String {
    ARCH_URL_TEMPLATE.replace("{}", arch)
}
