use std::fs;
use std::path::PathBuf;

use l5x_core::adapters::l5x::{read_l5x, write_l5x_file, WriterOptions};
use l5x_core::domain::factory::create_asset_or_default;
use l5x_core::domain::tag::TagScope;
use l5x_core::{
    AssetKind, EmbeddedTemplates, L5xCodec, L5xConfig, ProjectCodec, ProjectService, TreeObject,
};
use pretty_assertions::assert_eq;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/Line1.L5X")
}

fn cell_fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/Cell2.L5X")
}

/// Slice from the first `open` up to and including the next `close`.
fn element<'a>(xml: &'a str, open: &str, close: &str) -> &'a str {
    let start = xml.find(open).unwrap();
    let end = start + xml[start..].find(close).unwrap() + close.len();
    &xml[start..end]
}

fn service() -> ProjectService<L5xCodec, EmbeddedTemplates> {
    ProjectService::new(L5xCodec::default(), EmbeddedTemplates)
}

#[test]
fn save_of_a_reloaded_project_is_stable() {
    let service = service();
    let first = service.save_string(&service.load_file(&fixture_path()).unwrap()).unwrap();
    let second = service.save_string(&service.load_str(&first).unwrap()).unwrap();
    assert_eq!(second, first);
    assert!(first.contains("<Text><![CDATA[XIC(Local1)ADD(Count,1,Count);]]></Text>"));
    assert!(first.contains("<Description><![CDATA[Packaging line 1]]></Description>"));
    assert!(first.contains(r#"<Task Name="MainTask""#));
    assert!(!first.contains(r#"Name="BOOL""#));
}

#[test]
fn aoi_and_module_attributes_survive_reload() {
    let service = service();
    let controller = service.load_file(&cell_fixture_path()).unwrap();
    let aoi = controller.aois().get("ValveCtl").unwrap();
    assert_eq!(aoi.revision_extension(), "<beta>");
    assert_eq!(aoi.edited_by(), "plant\\eng2");
    assert_eq!(aoi.description(), "Open/close valve with <feedback> check & timeout");
    assert_eq!(aoi.parameters().names(), vec!["EnableIn", "EnableOut", "OpenCmd", "Open"]);
    let rack = controller.modules().get("Rack2_Slot1").unwrap();
    assert_eq!(rack.rpi(), "10000");
    assert_eq!(rack.output_connection_size().unwrap(), 4);
    assert_eq!(rack.output_tag().unwrap().resolved_size().unwrap(), 4);
    assert_eq!(rack.input_tag().unwrap().resolved_size().unwrap(), 8);

    let first = service.save_string(&controller).unwrap();
    let second = service.save_string(&service.load_str(&first).unwrap()).unwrap();
    assert_eq!(second, first);
    assert!(first.contains(r#"RevisionExtension="&lt;beta&gt;""#));
    assert!(first.contains(r#"EditedBy="plant\eng2""#));
    assert!(first.contains(
        "<Description><![CDATA[Open/close valve with <feedback> check & timeout]]></Description>"
    ));
    assert!(first.contains(r#"<Connection Name="Data" RPI="10000" Type="Output""#));
    assert!(first.contains(r#"<DefaultData Format="L5K"><![CDATA[5000]]></DefaultData>"#));
}

#[test]
fn imported_aoi_and_module_export_unchanged() {
    let service = service();
    let direct = service
        .save_string(&service.load_file(&cell_fixture_path()).unwrap())
        .unwrap();

    let mut target = service.new_controller(Some("Cell9")).unwrap();
    let summary = service
        .import_from_file(&mut target, &cell_fixture_path(), &[AssetKind::Aoi, AssetKind::Module])
        .unwrap();
    assert_eq!(summary.imported, 3);
    let imported = service.save_string(&target).unwrap();

    let aois = ("<AddOnInstructionDefinitions>", "</AddOnInstructionDefinitions>");
    assert_eq!(element(&imported, aois.0, aois.1), element(&direct, aois.0, aois.1));
    let rack = (r#"<Module Name="Rack2_Slot1""#, "</Module>");
    assert_eq!(element(&imported, rack.0, rack.1), element(&direct, rack.0, rack.1));
}

#[test]
fn raw_tree_survives_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let document = read_l5x(fixture_path()).unwrap();
    let out = dir.path().join("copy.L5X");
    write_l5x_file(&document, &out, &WriterOptions::default()).unwrap();
    assert_eq!(read_l5x(&out).unwrap(), document);
}

#[test]
fn save_file_appends_extension() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    let mut controller = service.new_controller(Some("Cell7")).unwrap();
    let tag = create_asset_or_default(AssetKind::Tag, None, service.templates(), &TagScope::Controller)
        .unwrap();
    controller.add_asset(tag, None);

    let written = service.save_file(&controller, &dir.path().join("cell7")).unwrap();
    assert_eq!(written, dir.path().join("cell7.L5X"));
    let reloaded = service.load_file(&written).unwrap();
    assert_eq!(reloaded.name(), "Cell7");
    assert_eq!(reloaded.tags().names(), vec!["NewTag"]);
    assert_eq!(reloaded.programs().names(), vec!["MainProgram"]);
}

#[test]
fn import_copies_selected_asset_kinds() {
    let service = service();
    let mut target = service.new_controller(None).unwrap();
    let summary = service
        .import_from_file(
            &mut target,
            &fixture_path(),
            &[AssetKind::Datatype, AssetKind::Tag],
        )
        .unwrap();
    assert_eq!(summary.imported, 6);
    assert_eq!(summary.skipped, 0);
    assert_eq!(target.programs().names(), vec!["MainProgram"]);
    let station = target.tags().get("Station1").unwrap();
    assert_eq!(target.endpoint_operands(station).len(), 3);
    assert_eq!(target.get_base_tag(target.tags().get("CountAlias2").unwrap()).unwrap().name(), "Count");
}

#[test]
fn import_skips_invalid_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.L5X");
    fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<RSLogix5000Content SchemaRevision="1.0">
  <Controller Name="Donor">
    <Tags>
      <Tag Name="Good" TagType="Base" DataType="DINT"/>
      <Tag Name="Bad Tag" TagType="Base" DataType="DINT"/>
    </Tags>
  </Controller>
</RSLogix5000Content>"#,
    )
    .unwrap();
    let service = service();
    let mut target = service.new_controller(None).unwrap();
    let summary = service
        .import_from_file(&mut target, &path, &[AssetKind::Tag, AssetKind::Module])
        .unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);
    assert!(target.tags().contains("Good"));
}

#[test]
fn unreadable_files_carry_context() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    let err = service.load_file(&dir.path().join("absent.L5X")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read project file"));

    let broken = dir.path().join("broken.L5X");
    fs::write(&broken, "<RSLogix5000Content><Controller></RSLogix5000Content>").unwrap();
    let err = service.load_file(&broken).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load project file"));
}

#[test]
fn configured_service_uses_profiles_and_template_overrides() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("_tag.L5X"),
        r#"<Tag Name="Spare" Class="Standard" TagType="Base" DataType="DINT" Radix="Decimal"/>"#,
    )
    .unwrap();
    let config_path = dir.path().join("l5x_config.json");
    let config = serde_json::json!({
        "templates_dir": dir.path(),
        "writer": {"indent": 0},
        "default_controller_name": "Blank",
        "profiles": [
            {"name": "other_plant", "program_patterns": ["MCP_*"]},
            {"name": "packaging", "program_patterns": ["Main*"], "tag_patterns": ["Station?"]}
        ]
    });
    fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let config = L5xConfig::load_from_file(&config_path).unwrap();
    let service = ProjectService::from_config(&config);

    let controller = service.load_file(&fixture_path()).unwrap();
    assert_eq!(controller.profile(), Some("packaging"));

    let blank = service.new_controller(None).unwrap();
    assert_eq!(blank.name(), "Blank");
    assert!(blank.profile().is_none());

    let tag = create_asset_or_default(AssetKind::Tag, None, service.templates(), &TagScope::Controller)
        .unwrap();
    assert_eq!(tag.name(), "Spare");

    let xml = service.save_string(&controller).unwrap();
    assert!(!xml.contains('\n'));
    assert_eq!(L5xCodec::default().extension(), "L5X");
}
