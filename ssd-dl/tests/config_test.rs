use anyhow::Result;
use ssd_dl::{
    activation::ClassActivation,
    class::ClassLayout,
    config::{Config, CONFIG_VERSION},
};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: &[&str] = &["ssd300.json5", "toy.json5"];

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
    static ref CONFIG_FILES: Vec<PathBuf> = {
        CONFIG_FILE_NAMES.iter().map(|file_name| CONFIG_DIR.join(file_name)).collect()
    };
}

#[test]
fn config_files_build_models() -> Result<()> {
    CONFIG_FILES.iter().try_for_each(|path| -> Result<_> {
        let config = Config::open(path)?;
        assert!(CONFIG_VERSION.matches(&config.version));
        let _model = config.model_init().build()?;
        Ok(())
    })?;
    Ok(())
}

#[test]
fn ssd300_config_test() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("ssd300.json5"))?;
    assert_eq!(config.class_layout, ClassLayout::WithBackground);
    assert_eq!(config.activation, ClassActivation::Softmax);

    let model = config.model_init().build()?;
    assert_eq!(model.dboxes().len(), 8732);
    assert_eq!(model.class_space().num_objects(), 20);
    assert_eq!(
        model.dboxes().names().as_slice(),
        ["conv4_3", "conv7", "conv8_2", "conv9_2", "conv10_2", "conv11_2"]
    );

    let variants: Vec<_> = model
        .dboxes()
        .layout()
        .maps()
        .iter()
        .map(|map| map.variants())
        .collect();
    assert_eq!(variants, vec![4, 6, 6, 6, 4, 4]);
    Ok(())
}

#[test]
fn missing_config_file() {
    assert!(Config::open(CONFIG_DIR.join("no-such-file.json5")).is_err());
}
