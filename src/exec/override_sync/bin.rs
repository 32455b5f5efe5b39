use std::{
    env,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process,
};

use glam::Vec4;
use override_sync::{
    EnvironmentMode, ImportMode, MemoryScene, OverrideEditor, SessionConfig, SyncEngine,
    UserDialogs,
    host::{FixedAnswer, SceneHost},
    override_editor::menu::PropertyMenu,
    override_types::{
        Color, MaterialHandle, ModelError, ObjectHandle, PropertyKind, PropertyValue,
        RendererHandle, ShaderProperty, ShaderPropertyType, TextureHandle,
    },
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        process::exit(1);
    }
}

struct Options {
    project: PathBuf,
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    assume_yes: bool,
    command: Vec<String>,
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "override_sync".to_string());

    let mut options = Options {
        project: PathBuf::from("."),
        config: None,
        scene: None,
        assume_yes: false,
        command: Vec::new(),
    };

    let mut iter = args;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            "--project" => {
                options.project = iter
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| "--project requires a directory".to_string())?;
            }
            "--config" => {
                options.config = Some(
                    iter.next()
                        .map(PathBuf::from)
                        .ok_or_else(|| "--config requires a file path".to_string())?,
                );
            }
            "--scene" => {
                options.scene = Some(
                    iter.next()
                        .map(PathBuf::from)
                        .ok_or_else(|| "--scene requires a file path".to_string())?,
                );
            }
            "-y" | "--yes" => options.assume_yes = true,
            _ => {
                options.command.push(arg);
                options.command.extend(iter.by_ref());
            }
        }
    }

    if options.command.is_empty() {
        print_usage(&program);
        return Err("missing command".to_string());
    }

    let config = match &options.config {
        Some(path) => SessionConfig::load_blocking(path).map_err(|err| err.to_string())?,
        None => SessionConfig::default(),
    }
    .rooted_at(&options.project);
    let scene_path = options
        .scene
        .clone()
        .unwrap_or_else(|| options.project.join("scene.json"));

    let mut scene = load_scene(&scene_path)?;
    execute(&options, &config, &mut scene)?;
    scene
        .save_blocking(&scene_path)
        .map_err(|err| err.to_string())
}

fn load_scene(path: &Path) -> Result<MemoryScene, String> {
    match MemoryScene::load_blocking(path) {
        Ok(scene) => Ok(scene),
        Err(err) if err.is_missing() => {
            info!(scene = %path.display(), "starting a new scene");
            Ok(MemoryScene::new())
        }
        Err(err) => Err(err.to_string()),
    }
}

fn execute(options: &Options, config: &SessionConfig, scene: &mut MemoryScene) -> Result<(), String> {
    let (command, args) = options
        .command
        .split_first()
        .ok_or_else(|| "missing command".to_string())?;

    // Scene authoring commands do not need an editor session.
    match command.as_str() {
        "scene-material" => return scene_material(scene, args),
        "scene-renderer" => return scene_renderer(scene, args),
        "scene-texture" => {
            let name = arg(args, 0, "texture name")?;
            println!("{}", scene.add_texture(name));
            return Ok(());
        }
        "scene" => {
            print_scene(scene);
            return Ok(());
        }
        _ => {}
    }

    let mut prefs = config.open_preferences();
    let mut editor = OverrideEditor::open(config, &prefs, scene).map_err(|err| err.to_string())?;
    let mut dialogs: Box<dyn UserDialogs> = if options.assume_yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(TerminalDialogs)
    };

    match command.as_str() {
        "list" => print_document(&editor, scene),
        "add-renderer" => {
            let handles = args
                .iter()
                .map(|value| parse_id(value, "renderer").map(RendererHandle))
                .collect::<Result<Vec<_>, _>>()?;
            let added = editor
                .add_renderers(&handles, scene)
                .map_err(|err| err.to_string())?;
            println!("added {added} renderer(s)");
        }
        "remove-renderer" => {
            let index = parse_index(arg(args, 0, "renderer index")?)?;
            editor
                .remove_renderer(index, scene)
                .map_err(|err| err.to_string())?;
        }
        "add-material" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = MaterialHandle(parse_id(arg(args, 1, "material id")?, "material")?);
            if !editor
                .add_material(renderer, material, scene)
                .map_err(|err| err.to_string())?
            {
                println!("{material} was not added");
            }
        }
        "remove-material" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = parse_index(arg(args, 1, "material index")?)?;
            editor
                .remove_material(renderer, material, scene)
                .map_err(|err| err.to_string())?;
        }
        "add-property" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = parse_index(arg(args, 1, "material index")?)?;
            let name = arg(args, 2, "property name")?;
            let kind: PropertyKind = arg(args, 3, "property kind")?
                .parse()
                .map_err(|err: ModelError| err.to_string())?;
            if !editor
                .add_property(renderer, material, name, kind, scene)
                .map_err(|err| err.to_string())?
            {
                println!("{name} is already overridden");
            }
        }
        "remove-property" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = parse_index(arg(args, 1, "material index")?)?;
            let property = parse_index(arg(args, 2, "property index")?)?;
            editor
                .remove_property(renderer, material, property, scene)
                .map_err(|err| err.to_string())?;
        }
        "set-value" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = parse_index(arg(args, 1, "material index")?)?;
            let property = parse_index(arg(args, 2, "property index")?)?;
            let kind = editor
                .document()
                .renderers
                .get(renderer)
                .and_then(|set| set.materials.get(material))
                .and_then(|set| set.properties.get(property))
                .map(|prop| prop.kind)
                .ok_or_else(|| "no property at that position".to_string())?;
            let value = parse_value(kind, &args[3.min(args.len())..])?;
            editor
                .set_property_value(renderer, material, property, value)
                .map_err(|err| err.to_string())?;
        }
        "apply" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            match editor.apply(renderer, scene).map_err(|err| err.to_string())? {
                Some(report) => println!(
                    "applied {} propert(ies) to {} slot(s)",
                    report.properties, report.slots
                ),
                None => println!("renderer is missing"),
            }
        }
        "apply-all" => {
            let report = editor.apply_all(scene);
            println!("applied {} renderer(s), {} missing", report.applied, report.missing);
        }
        "revert" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let outcome = editor.revert(renderer).map_err(|err| err.to_string())?;
            println!("{outcome:?}");
        }
        "export" => {
            let report = editor.export(scene);
            println!(
                "exported {} mesh(es) with {} material(s) to {}",
                report.nodes, report.materials, report.root
            );
        }
        "import" => {
            if let Some(root) = args.get(1).filter(|_| args[0] == "--from") {
                editor.select_mirror(Some(ObjectHandle(parse_id(root, "mirror")?)));
            }
            let mode = if args.iter().any(|a| a == "--merge") {
                Some(ImportMode::Merge)
            } else if args.iter().any(|a| a == "--clear") {
                Some(ImportMode::ClearExisting)
            } else {
                None
            };
            let result = match mode {
                Some(mode) => editor.import(mode, scene, dialogs.as_mut()),
                None => editor.import_interactive(scene, dialogs.as_mut()),
            };
            result.map_err(|err| err.to_string())?;
        }
        "clear" => {
            if !editor
                .clear_all(scene, dialogs.as_mut())
                .map_err(|err| err.to_string())?
            {
                println!("nothing cleared");
            }
        }
        "menu" => {
            let renderer = parse_index(arg(args, 0, "renderer index")?)?;
            let material = parse_index(arg(args, 1, "material index")?)?;
            match editor
                .property_menu(renderer, material, &*scene)
                .map_err(|err| err.to_string())?
            {
                PropertyMenu::Entries(entries) => {
                    for entry in entries {
                        println!("{} ({})", entry.path, entry.kind);
                    }
                }
                PropertyMenu::Unavailable(reason) => println!("{reason}"),
            }
        }
        "simulate" => {
            // Close first so the engine replays what this session left on disk.
            editor
                .close(&mut prefs, scene)
                .map_err(|err| err.to_string())?;
            let mut sync = SyncEngine::new(config.document_store(), config.mirror_pointer());
            sync.on_mode_changed(EnvironmentMode::Simulating, scene, &prefs);
            scene.reset_property_blocks();
            if let Some(report) = sync.on_mode_changed(EnvironmentMode::Authoring, scene, &prefs) {
                println!(
                    "replayed {} renderer(s) and {} mirror node(s)",
                    report.renderers, report.mirror_nodes
                );
            }
            return Ok(());
        }
        "open" => {
            editor
                .close(&mut prefs, scene)
                .map_err(|err| err.to_string())?;
            let mut sync = SyncEngine::new(config.document_store(), config.mirror_pointer());
            sync.on_document_opened();
            let ran = sync.run_idle(scene, &prefs);
            println!("ran {ran} deferred task(s)");
            return Ok(());
        }
        other => return Err(format!("unknown command: {other}")),
    }

    editor
        .close(&mut prefs, scene)
        .map_err(|err| err.to_string())
}

fn print_usage(program: &str) {
    println!("Usage: {program} [--project <DIR>] [--config <FILE>] [--scene <FILE>] [--yes] <COMMAND> [ARGS]");
    println!("\nScene:");
    println!("  scene                                  Print the scene objects");
    println!("  scene-material <NAME> [<SHADER> [<PROP>:<TYPE>...]]");
    println!("  scene-renderer <NAME> [<MATERIAL_ID>|none ...]");
    println!("  scene-texture <NAME>");
    println!("\nOverrides:");
    println!("  list                                   Print the override document");
    println!("  add-renderer <ID>...                   Add renderers with their materials");
    println!("  remove-renderer <R>");
    println!("  add-material <R> <MATERIAL_ID>");
    println!("  remove-material <R> <M>");
    println!("  add-property <R> <M> <NAME> <KIND>     KIND is scalar, color, vector or texture");
    println!("  remove-property <R> <M> <P>");
    println!("  set-value <R> <M> <P> <VALUE>...");
    println!("  apply <R> | apply-all | revert <R>");
    println!("  menu <R> <M>                           List shader properties that can be added");
    println!("  clear                                  Remove every renderer (asks first)");
    println!("\nMirror and sync:");
    println!("  export                                 Write overrides into the runtime mirror");
    println!("  import [--from <ID>] [--merge|--clear] Read overrides back from a mirror");
    println!("  simulate                               Run a simulation round trip and replay");
    println!("  open                                   Run the document-open replay");
    println!("\nOptions:");
    println!("  -y, --yes        Answer yes to every confirmation");
    println!("  -h, --help       Show this help message");
}

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("missing {what}"))
}

fn parse_index(value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .map_err(|_| format!("expected an index, got {value}"))
}

fn parse_id(value: &str, what: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("expected a {what} id, got {value}"))
}

fn parse_floats<const N: usize>(values: &[String]) -> Result<[f32; N], String> {
    if values.len() != N {
        return Err(format!("expected {N} number(s), got {}", values.len()));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value
            .parse::<f32>()
            .map_err(|_| format!("expected a number, got {value}"))?;
    }
    Ok(out)
}

fn parse_value(kind: PropertyKind, values: &[String]) -> Result<PropertyValue, String> {
    Ok(match kind {
        PropertyKind::Scalar => {
            let [value] = parse_floats::<1>(values)?;
            PropertyValue::Scalar(value)
        }
        PropertyKind::Color => {
            let [r, g, b, a] = parse_floats::<4>(values)?;
            PropertyValue::Color(Color::new(r, g, b, a))
        }
        PropertyKind::Vector4 => {
            let [x, y, z, w] = parse_floats::<4>(values)?;
            PropertyValue::Vector4(Vec4::new(x, y, z, w))
        }
        PropertyKind::Texture => match values {
            [value] if value == "none" => PropertyValue::Texture(None),
            [value] => PropertyValue::Texture(Some(TextureHandle(parse_id(value, "texture")?))),
            _ => return Err("expected a texture id or none".to_string()),
        },
    })
}

fn parse_shader_type(value: &str) -> Result<ShaderPropertyType, String> {
    match value.to_ascii_lowercase().as_str() {
        "color" => Ok(ShaderPropertyType::Color),
        "vector" => Ok(ShaderPropertyType::Vector),
        "float" => Ok(ShaderPropertyType::Float),
        "range" => Ok(ShaderPropertyType::Range),
        "texture" | "texenv" => Ok(ShaderPropertyType::Texture),
        other => Err(format!("unknown shader property type: {other}")),
    }
}

fn scene_material(scene: &mut MemoryScene, args: &[String]) -> Result<(), String> {
    let name = arg(args, 0, "material name")?;
    let shader = match args.get(1) {
        Some(shader) => {
            let properties = args[2..]
                .iter()
                .map(|entry| {
                    let (prop, ty) = entry
                        .split_once(':')
                        .ok_or_else(|| format!("expected <PROP>:<TYPE>, got {entry}"))?;
                    Ok(ShaderProperty {
                        name: prop.to_string(),
                        description: String::new(),
                        ty: parse_shader_type(ty)?,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            Some((shader.as_str(), properties))
        }
        None => None,
    };
    println!("{}", scene.add_material(name, shader));
    Ok(())
}

fn scene_renderer(scene: &mut MemoryScene, args: &[String]) -> Result<(), String> {
    let name = arg(args, 0, "renderer name")?;
    let materials = args[1..]
        .iter()
        .map(|value| match value.as_str() {
            "none" => Ok(None),
            id => parse_id(id, "material").map(|id| Some(MaterialHandle(id))),
        })
        .collect::<Result<Vec<_>, String>>()?;
    println!("{}", scene.add_renderer(name, materials));
    Ok(())
}

fn print_scene(scene: &MemoryScene) {
    for renderer in scene.renderer_handles() {
        let name = scene.renderer_name(renderer).unwrap_or_default();
        println!("{renderer} {name}");
        for (slot, material) in scene
            .renderer_materials(renderer)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
        {
            let label = material
                .and_then(|handle| scene.material_name(handle))
                .unwrap_or_else(|| "<none>".to_string());
            println!("  slot {slot}: {label}");
            if let Some(block) = scene.property_block(renderer, slot) {
                for (prop, value) in block.iter() {
                    println!("    {prop} = {value:?}");
                }
            }
        }
    }
    for root in scene.mirror_roots() {
        println!("mirror {root} {}", scene.object_name(root).unwrap_or_default());
    }
}

fn print_document(editor: &OverrideEditor, scene: &MemoryScene) {
    let document = editor.document();
    if document.is_empty() {
        println!("(no renderers)");
        return;
    }
    println!(
        "{} renderer(s), {} overridden propert(ies)",
        document.renderers.len(),
        document.property_count()
    );
    for (r, renderer) in document.renderers.iter().enumerate() {
        let name = renderer
            .target_renderer
            .and_then(|handle| scene.renderer_name(handle))
            .unwrap_or_else(|| "<missing>".to_string());
        let dirty = if renderer.dirty { " *" } else { "" };
        println!("[{r}] {name}{dirty}");
        for (m, material) in renderer.materials.iter().enumerate() {
            let name = material
                .target_material
                .and_then(|handle| scene.material_name(handle))
                .unwrap_or_else(|| "<missing>".to_string());
            let shader = material
                .target_material
                .and_then(|handle| scene.shader_name(handle))
                .unwrap_or_else(|| "no shader".to_string());
            println!("  [{m}] {name} ({shader})");
            for (p, prop) in material.properties.iter().enumerate() {
                println!(
                    "    [{p}] {} ({}) = {}",
                    prop.name,
                    prop.kind,
                    describe_value(scene, &prop.value)
                );
            }
        }
    }
}

fn describe_value(scene: &MemoryScene, value: &PropertyValue) -> String {
    match value {
        PropertyValue::Scalar(v) => format!("{v}"),
        PropertyValue::Color(c) => format!("rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a),
        PropertyValue::Vector4(v) => format!("({}, {}, {}, {})", v.x, v.y, v.z, v.w),
        PropertyValue::Texture(None) => "none".to_string(),
        PropertyValue::Texture(Some(texture)) => match scene.texture_name(*texture) {
            Some(name) => format!("{texture} {name}"),
            None => format!("{texture} <missing>"),
        },
    }
}

struct TerminalDialogs;

impl UserDialogs for TerminalDialogs {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        print!("{title}: {message} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn alert(&mut self, title: &str, message: &str) {
        println!("{title}: {message}");
    }
}
