use std::sync::Arc;

use prefs::{
    ArchiveError, Archiver, Defaults, NativeValue, SecureCodable, SecureCodingKey,
    SecureCodingOptionalKey, Store, StoreConfiguration, SuiteRegistry, SuiteStore, Unarchiver,
};

#[derive(Debug, Clone, PartialEq)]
struct Color {
    red: f64,
    green: f64,
    blue: f64,
    alpha: f64,
}

impl Color {
    const WHITE: Color = Color {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
        alpha: 1.0,
    };

    const TEAL: Color = Color {
        red: 0.0,
        green: 0.5,
        blue: 0.5,
        alpha: 1.0,
    };
}

impl SecureCodable for Color {
    const CLASS_NAME: &'static str = "Color";

    fn encode_with(&self, archiver: &mut Archiver) {
        archiver.encode_f64("red", self.red);
        archiver.encode_f64("green", self.green);
        archiver.encode_f64("blue", self.blue);
        archiver.encode_f64("alpha", self.alpha);
    }

    fn decode_with(unarchiver: &Unarchiver) -> Result<Self, ArchiveError> {
        Ok(Color {
            red: unarchiver.decode_f64("red")?,
            green: unarchiver.decode_f64("green")?,
            blue: unarchiver.decode_f64("blue")?,
            alpha: if unarchiver.contains("alpha") {
                unarchiver.decode_f64("alpha")?
            } else {
                1.0
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Palette {
    name: String,
    colors: Vec<Color>,
}

impl SecureCodable for Palette {
    const CLASS_NAME: &'static str = "Palette";

    fn encode_with(&self, archiver: &mut Archiver) {
        archiver.encode_string("name", &self.name);
        archiver.encode_objects("colors", &self.colors);
    }

    fn decode_with(unarchiver: &Unarchiver) -> Result<Self, ArchiveError> {
        Ok(Palette {
            name: unarchiver.decode_string("name")?,
            colors: unarchiver.decode_objects("colors")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Label(String);

impl SecureCodable for Label {
    const CLASS_NAME: &'static str = "Label";

    fn encode_with(&self, archiver: &mut Archiver) {
        archiver.encode_string("text", &self.0);
    }

    fn decode_with(unarchiver: &Unarchiver) -> Result<Self, ArchiveError> {
        unarchiver.decode_string("text").map(Label)
    }
}

fn file_configuration(folder: &tempfile::TempDir) -> StoreConfiguration {
    StoreConfiguration::File {
        suite: "com.example.prefs".to_owned(),
        folder_path: folder.path().to_path_buf(),
    }
}

#[test]
fn secure_key_reads_default_then_written_value() {
    let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
    let accent: SecureCodingKey<Color> = SecureCodingKey::new("accent", Color::WHITE, store.clone());

    assert_eq!(accent.get(), Color::WHITE);
    accent.set(Color::TEAL);
    assert_eq!(accent.get(), Color::TEAL);
    assert!(matches!(store.get_raw("accent"), Some(NativeValue::Data(_))));
}

#[test]
fn secure_values_survive_reopening_the_suite() {
    let folder = tempfile::tempdir().unwrap();

    {
        let defaults = Defaults::open(&SuiteRegistry::new(), file_configuration(&folder)).unwrap();
        let accent: SecureCodingKey<Color> = defaults.key("accent", Color::WHITE);
        let palette: SecureCodingOptionalKey<Palette> = defaults.optional_key("palette");

        accent.set(Color::TEAL);
        palette.set(Some(Palette {
            name: "sea".to_owned(),
            colors: vec![Color::TEAL, Color::WHITE],
        }));
    }

    // A fresh registry reads the suite back from disk, like another process would.
    let defaults = Defaults::open(&SuiteRegistry::new(), file_configuration(&folder)).unwrap();
    let accent: SecureCodingKey<Color> = defaults.key("accent", Color::WHITE);
    let palette: SecureCodingOptionalKey<Palette> = defaults.optional_key("palette");

    assert_eq!(accent.get(), Color::TEAL);
    let palette = palette.get().unwrap();
    assert_eq!(palette.name, "sea");
    assert_eq!(palette.colors, vec![Color::TEAL, Color::WHITE]);
}

#[test]
fn defaults_are_not_persisted() {
    let folder = tempfile::tempdir().unwrap();

    {
        let defaults = Defaults::open(&SuiteRegistry::new(), file_configuration(&folder)).unwrap();
        let _: SecureCodingKey<Color> = defaults.key("accent", Color::TEAL);
    }

    let defaults = Defaults::open(&SuiteRegistry::new(), file_configuration(&folder)).unwrap();
    let accent: SecureCodingKey<Color> = defaults.key("accent", Color::WHITE);

    assert_eq!(accent.get(), Color::WHITE);
    assert!(defaults.store().managed_names().is_empty());
}

#[test]
fn archives_of_another_class_fall_back_to_default() {
    let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
    let label: SecureCodingOptionalKey<Label> = SecureCodingOptionalKey::new("slot", store.clone());
    let accent: SecureCodingKey<Color> = SecureCodingKey::new("slot", Color::WHITE, store);

    label.set(Some(Label("not a color".to_owned())));

    assert_eq!(accent.get(), Color::WHITE);
    assert_eq!(label.get(), Some(Label("not a color".to_owned())));
}

#[test]
fn non_archive_values_fall_back_to_default() {
    let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
    let accent: SecureCodingKey<Color> = SecureCodingKey::new("accent", Color::WHITE, store.clone());

    store.set_raw("accent", NativeValue::from("teal"));
    assert_eq!(accent.get(), Color::WHITE);

    store.set_raw("accent", NativeValue::Data(vec![0xff, 0x00, 0x13]));
    assert_eq!(accent.get(), Color::WHITE);
}

#[test]
fn reset_restores_secure_default() {
    let store: Arc<dyn Store> = Arc::new(SuiteStore::new());
    let accent: SecureCodingKey<Color> = SecureCodingKey::new("accent", Color::WHITE, store.clone());
    let palette: SecureCodingOptionalKey<Palette> = SecureCodingOptionalKey::new("palette", store);

    accent.set(Color::TEAL);
    palette.set(Some(Palette {
        name: "mono".to_owned(),
        colors: vec![],
    }));
    prefs::reset(&[&accent, &palette]);

    assert_eq!(accent.get(), Color::WHITE);
    assert_eq!(palette.get(), None);
}
