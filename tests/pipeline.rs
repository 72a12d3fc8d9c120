/*
 *  tests/pipeline.rs
 *
 *  Integration tests for the asset/plugin pipeline
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 */

use std::any::Any;
use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use chiron::asset::manager::LoadServices;
use chiron::asset::{Asset, AssetManager, Component, ComponentInfo, SharedAsset};
use chiron::compute::ComputeManager;
use chiron::config::{AssetsManifest, PluginsManifest};
use chiron::driver::Driver;
use chiron::error::CoreError;
use chiron::plugin::{LoadContext, Plugin, PluginManager};
use chiron::render::RenderManager;
use chiron::types::{AssetComponentType, AssetId, AssetType, PluginType};

// ---------------------------------------------------------------------------
// test doubles
// ---------------------------------------------------------------------------

struct RecordingComponent {
    ty: AssetComponentType,
    owner: Option<AssetId>,
    info: ComponentInfo,
}

impl Component for RecordingComponent {
    fn component_type(&self) -> AssetComponentType {
        self.ty
    }
    fn owner(&self) -> Option<AssetId> {
        self.owner
    }
    fn set_owner(&mut self, owner: AssetId) -> Result<(), CoreError> {
        if self.owner.is_some() {
            return Err(CoreError::InvalidState("owner already set".into()));
        }
        self.owner = Some(owner);
        Ok(())
    }
    fn initialize(&mut self, _config: &str, _asset: &Asset) -> Result<(), CoreError> {
        Ok(())
    }
    fn info(&self) -> ComponentInfo {
        self.info
    }
    fn update(&mut self) {}
    fn cleanup(&mut self) {}
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Attaches one component per request; acquires a render buffer so the
/// capability callbacks get exercised end to end.
struct RecordingPlugin {
    name: String,
    dropped: Rc<Cell<bool>>,
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_asset_component(
        &self,
        ctx: &LoadContext,
        config: &str,
        ty: AssetComponentType,
        asset: &SharedAsset,
    ) -> Result<(), CoreError> {
        let buffer = ctx
            .render
            .create_buffer(chiron::render::BufferKind::Vertex, 1024);
        let mut component = Box::new(RecordingComponent {
            ty,
            owner: None,
            info: ComponentInfo {
                position_buffer: Some(buffer),
                ..Default::default()
            },
        });
        component.initialize(config, &asset.borrow())?;
        asset.borrow_mut().add(ty, component)
    }

    fn cleanup(&mut self) {}
}

impl Drop for RecordingPlugin {
    fn drop(&mut self) {
        self.dropped.set(true);
    }
}

fn registered_plugin(name: &str) -> (Box<dyn Plugin>, Rc<Cell<bool>>) {
    let dropped = Rc::new(Cell::new(false));
    (
        Box::new(RecordingPlugin {
            name: name.to_string(),
            dropped: Rc::clone(&dropped),
        }),
        dropped,
    )
}

struct Scene {
    plugins: PluginManager,
    render: RenderManager,
    compute: ComputeManager,
    _dir: tempfile::TempDir,
    assets_path: PathBuf,
}

impl Scene {
    /// Manifests on disk: Apple (Rigid) with Geometry+Render, Liver
    /// (Deformable_MSD) with Geometry.
    fn build(register: bool) -> Self {
        let mut plugins = PluginManager::new();
        if register {
            let (rigid, _) = registered_plugin("Rigid");
            plugins.add(PluginType::Rigid, rigid).unwrap();
            let (msd, _) = registered_plugin("CpuMsd");
            plugins.add(PluginType::CpuMsd, msd).unwrap();
        }
        let mut render = RenderManager::new();
        render.initialize(None);
        let mut compute = ComputeManager::new();
        compute.initialize(None);

        let dir = tempfile::tempdir().unwrap();
        let apple_cfg = dir.path().join("apple.yaml");
        fs::write(&apple_cfg, "Geometry: {}\nRender: {}\n").unwrap();
        let liver_cfg = dir.path().join("liver.yaml");
        fs::write(&liver_cfg, "Geometry: {}\n").unwrap();

        let assets_path = dir.path().join("assets.yaml");
        fs::write(
            &assets_path,
            format!(
                "assets:\n\
                 \x20 - name: Apple\n\
                 \x20   type: Rigid\n\
                 \x20   config: {}\n\
                 \x20   components:\n\
                 \x20     - type: Geometry\n\
                 \x20       loading_plugin: Rigid\n\
                 \x20     - type: Render\n\
                 \x20       loading_plugin: Rigid\n\
                 \x20 - name: Liver\n\
                 \x20   type: Deformable_MSD\n\
                 \x20   config: {}\n\
                 \x20   components:\n\
                 \x20     - type: Geometry\n\
                 \x20       loading_plugin: CpuMsd\n",
                apple_cfg.display(),
                liver_cfg.display()
            ),
        )
        .unwrap();

        Scene {
            plugins,
            render,
            compute,
            _dir: dir,
            assets_path,
        }
    }

    fn services(&self) -> LoadServices<'_> {
        LoadServices {
            plugins: &self.plugins,
            render: &self.render,
            compute: &self.compute,
        }
    }
}

// ---------------------------------------------------------------------------
// scenarios
// ---------------------------------------------------------------------------

#[test]
fn full_pipeline_loads_assets_with_owner_backrefs() {
    let scene = Scene::build(true);
    let manifest = AssetsManifest::from_file(&scene.assets_path).unwrap();

    let mut assets = AssetManager::new();
    assets.initialize(&manifest, &scene.services()).unwrap();
    assert_eq!(assets.asset_count(), 2);

    let apple = assets.get(AssetId::Apple).unwrap();
    {
        let apple = apple.borrow();
        assert_eq!(apple.asset_type(), AssetType::Rigid);
        assert!(apple.is_loaded());
        let geometry = apple.get(AssetComponentType::Geometry).unwrap();
        assert_eq!(geometry.owner(), Some(AssetId::Apple));
        let render = apple.get(AssetComponentType::Render).unwrap();
        assert!(render.info().position_buffer.is_some());
    }

    let liver = assets.get(AssetId::Liver).unwrap();
    assert_eq!(liver.borrow().asset_type(), AssetType::DeformableMsd);

    // one buffer acquired per component
    assert_eq!(scene.render.outstanding(), 3);
}

#[test]
fn duplicate_asset_fails_with_full_rollback() {
    let scene = Scene::build(true);
    let mut manifest = AssetsManifest::from_file(&scene.assets_path).unwrap();
    let duplicate = manifest.assets[0].clone();
    manifest.assets.push(duplicate);

    let mut assets = AssetManager::new();
    let err = assets.initialize(&manifest, &scene.services()).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateRegistration { .. }));
    // no Apple entry survives the rollback
    assert!(assets.get(AssetId::Apple).is_none());
    assert_eq!(assets.asset_count(), 0);
}

#[test]
fn loading_before_plugin_registration_fails_cleanly() {
    let scene = Scene::build(false);
    let manifest = AssetsManifest::from_file(&scene.assets_path).unwrap();

    let mut assets = AssetManager::new();
    let err = assets.initialize(&manifest, &scene.services()).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    // components attached to earlier assets were released too
    assert_eq!(assets.asset_count(), 0);
}

#[test]
fn plugin_registry_uniqueness_and_lookup() {
    let mut plugins = PluginManager::new();
    let (first, first_dropped) = registered_plugin("first");
    plugins.add(PluginType::Rigid, first).unwrap();

    let (second, second_dropped) = registered_plugin("second");
    assert!(plugins.add(PluginType::Rigid, second).is_err());
    assert!(second_dropped.get());
    assert!(!first_dropped.get());

    assert_eq!(plugins.get(PluginType::Rigid).unwrap().name(), "first");
    assert!(plugins.get(PluginType::OclXfem).is_none());
}

#[test]
fn plugin_manager_cleanup_drops_plugins_before_libraries() {
    let mut plugins = PluginManager::new();
    let (plugin, dropped) = registered_plugin("Rigid");
    plugins.add(PluginType::Rigid, plugin).unwrap();

    // no libraries are loaded here, so cleanup succeeding with the drop
    // flag set demonstrates the plugins-first half of the ordering; the
    // libraries map is already empty by the time unload would run
    plugins.cleanup();
    assert!(dropped.get());
    assert_eq!(plugins.plugin_count(), 0);
}

#[test]
fn plugins_manifest_count_mismatch_rejected() {
    let manifest = PluginsManifest::parse("count: 2\nplugins:\n  - name: Rigid\n").unwrap();
    let mut plugins = PluginManager::new();
    assert!(plugins.initialize(&manifest).is_err());
    assert!(!plugins.is_initialized());
}

#[test]
fn enum_names_round_trip_via_public_api() {
    for id in AssetId::ALL {
        assert_eq!(AssetId::from_name(id.name()), id);
    }
    for ty in PluginType::ALL {
        assert_eq!(PluginType::from_name(ty.name()), ty);
    }
    for ty in AssetComponentType::ALL {
        assert_eq!(AssetComponentType::from_name(ty.name()), ty);
    }
    for ty in AssetType::ALL {
        assert_eq!(AssetType::from_name(ty.name()), ty);
    }
    assert_eq!(AssetId::from_name("NotAnAsset"), AssetId::Unknown);
    assert_eq!(PluginType::from_name("NotAPlugin"), PluginType::Unknown);
}

#[test]
fn driver_initializes_and_tears_down_empty_scene() {
    let mut driver = Driver::new(99);
    driver.initialize(&chiron::config::Config::default()).unwrap();
    assert!(driver.get_asset(AssetId::Apple).is_none());
    driver.quit();
    driver.run();
    driver.cleanup();
    assert!(driver.registry().is_empty());
}

#[test]
fn driver_rolls_back_when_plugin_manifest_is_missing() {
    let mut driver = Driver::new(99);
    let config = chiron::config::Config {
        plugins: Some(PathBuf::from("/does/not/exist.yaml")),
        ..Default::default()
    };
    assert!(driver.initialize(&config).is_err());
    assert!(driver.registry().is_empty());
}
