use crate::{
    activation::ClassActivation,
    class::ClassLayout,
    codec::DEFAULT_DECODE_CLIP,
    common::*,
    dbox::DefaultBoxInit,
    image::{InputShape, Normalization},
    model::SsdModelInit,
};

pub use codec::*;
pub use inference::*;
pub use matcher::*;

pub static CONFIG_VERSION: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse("0.1.0").unwrap());

/// The SSD model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub input_shape: InputShape,
    /// The number of classifier logits per default box, background included.
    pub class_nums: usize,
    #[serde(default = "default_class_layout")]
    pub class_layout: ClassLayout,
    #[serde(default)]
    pub activation: ClassActivation,
    pub default_boxes: DefaultBoxInit,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub normalization: Normalization,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file '{}'", path.display()))?;
        let config = Self::from_json5_str(&text)
            .with_context(|| format!("unable to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn from_json5_str(text: &str) -> Result<Self> {
        let config = json5::from_str(text)?;
        Ok(config)
    }

    pub fn model_init(&self) -> SsdModelInit {
        let Self {
            input_shape,
            class_nums,
            class_layout,
            activation,
            ref default_boxes,
            ref codec,
            ref matcher,
            ref inference,
            ref normalization,
            ..
        } = *self;

        SsdModelInit {
            input_shape,
            class_nums,
            class_layout,
            activation,
            default_boxes: default_boxes.clone(),
            codec: codec.clone(),
            matcher: matcher.clone(),
            inference: inference.clone(),
            normalization: normalization.clone(),
        }
    }
}

mod codec {
    use super::*;

    /// Offset encoding options.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CodecConfig {
        #[serde(default = "default_variance_center")]
        pub variance_center: R64,
        #[serde(default = "default_variance_size")]
        pub variance_size: R64,
        /// The upper bound of the scaled log-size offset before exponentiation.
        #[serde(default = "default_decode_clip")]
        pub decode_clip: R64,
    }

    impl Default for CodecConfig {
        fn default() -> Self {
            Self {
                variance_center: default_variance_center(),
                variance_size: default_variance_size(),
                decode_clip: default_decode_clip(),
            }
        }
    }

    fn default_variance_center() -> R64 {
        r64(0.1)
    }

    fn default_variance_size() -> R64 {
        r64(0.2)
    }

    fn default_decode_clip() -> R64 {
        *DEFAULT_DECODE_CLIP
    }
}

mod matcher {
    use super::*;

    /// Ground truth matching options.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MatcherConfig {
        #[serde(default = "default_iou_threshold")]
        pub iou_threshold: R64,
    }

    impl Default for MatcherConfig {
        fn default() -> Self {
            Self {
                iou_threshold: default_iou_threshold(),
            }
        }
    }

    fn default_iou_threshold() -> R64 {
        r64(0.5)
    }
}

mod inference {
    use super::*;

    /// Post-processing options.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InferenceConfig {
        #[serde(default = "default_conf_threshold")]
        pub conf_threshold: R64,
        #[serde(default = "default_nms_iou_threshold")]
        pub nms_iou_threshold: R64,
        #[serde(default = "default_max_detections")]
        pub top_k: usize,
        #[serde(default = "default_max_detections")]
        pub keep_per_class: usize,
    }

    impl Default for InferenceConfig {
        fn default() -> Self {
            Self {
                conf_threshold: default_conf_threshold(),
                nms_iou_threshold: default_nms_iou_threshold(),
                top_k: default_max_detections(),
                keep_per_class: default_max_detections(),
            }
        }
    }

    fn default_conf_threshold() -> R64 {
        r64(0.01)
    }

    fn default_nms_iou_threshold() -> R64 {
        r64(0.45)
    }

    fn default_max_detections() -> usize {
        200
    }
}

fn default_class_layout() -> ClassLayout {
    ClassLayout::WithBackground
}

pub fn deserialize_version<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let version = Version::parse(&text).map_err(|err| {
        D::Error::custom(format!(
            "failed to parse version number '{}': {:?}",
            text, err
        ))
    })?;

    if !CONFIG_VERSION.matches(&version) {
        return Err(D::Error::custom(format!(
            "incompatible version: expect {}, found {}",
            *CONFIG_VERSION, version,
        )));
    }

    Ok(version)
}
