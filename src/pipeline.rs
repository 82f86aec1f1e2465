//! Load, then convert.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::MappingConfig;
use crate::dxf::DxfDrawing;
use crate::error::Error;
use crate::loader::Loader;
use crate::mapping::{MappingResolver, MappingRule};
use crate::primitive::{Document, DocumentSummary};
use crate::sink::DrawingSink;
use crate::synth::EntitySynthesizer;
use crate::units;

/// Outcome of one conversion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionResult {
    /// Set once the drawing has been saved.
    pub output_path: Option<PathBuf>,
    pub written_entities: usize,
    /// Distinct layer names, sorted.
    pub created_layers: Vec<String>,
    pub log_messages: Vec<String>,
    pub warnings: Vec<String>,
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.output_path {
            writeln!(f, "Output: {}", path.display())?;
        }
        writeln!(f, "Entities: {}", self.written_entities)?;
        write!(f, "Layers: {}", self.created_layers.join(", "))?;
        if !self.warnings.is_empty() {
            write!(f, "\nWarnings: {}", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Write every primitive of `document` into `sink`.
///
/// A primitive that fails (layer creation or entity synthesis) is recorded
/// as a warning and the run continues with the next one.
pub fn convert<S: DrawingSink + ?Sized>(
    document: &Document,
    resolver: &MappingResolver,
    sink: &mut S,
) -> ConversionResult {
    let mut synth = EntitySynthesizer::new(resolver);
    let mut layers = BTreeSet::new();
    let mut written_entities = 0;
    let mut warnings = Vec::new();

    for primitive in &document.primitives {
        let attributes = resolver.resolve(primitive);
        let created = sink.ensure_layer(
            &attributes.layer,
            attributes.color,
            &attributes.linetype,
            attributes.lineweight_mm.map(units::lineweight_to_hundredths),
        );
        if let Err(e) = created {
            let warning = format!("Could not create layer {} for {}: {}", attributes.layer, primitive.label(), e);
            warn!("{}", warning);
            warnings.push(warning);
            continue;
        }
        layers.insert(attributes.layer.clone());

        match synth.write(sink, primitive, &attributes) {
            Ok(count) => written_entities += count,
            Err(e) => {
                let warning = format!("Could not write {}: {}", primitive.label(), e);
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    let (log_messages, synth_warnings) = synth.into_parts();
    warnings.extend(synth_warnings);
    info!(
        "Converted {:?}: {} entities on {} layers, {} warnings",
        document.path,
        written_entities,
        layers.len(),
        warnings.len()
    );
    ConversionResult {
        output_path: None,
        written_entities,
        created_layers: layers.into_iter().collect(),
        log_messages,
        warnings,
    }
}

/// A loader and a mapping resolver, converting SVG files to DXF files.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    loader: Loader,
    resolver: MappingResolver,
}

impl Pipeline {
    pub fn new(resolver: MappingResolver) -> Self {
        Self {
            loader: Loader::new(),
            resolver,
        }
    }

    pub fn with_loader(loader: Loader, resolver: MappingResolver) -> Self {
        Self { loader, resolver }
    }

    /// Add an external style sheet read from `path`.
    pub fn add_stylesheet_file(&mut self, path: &Path) -> Result<(), Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.loader.add_stylesheet(text);
        Ok(())
    }

    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut MappingResolver {
        &mut self.resolver
    }

    pub fn default_rules(&self) -> Vec<MappingRule> {
        MappingResolver::default_rules()
    }

    /// Load a mapping configuration file and apply it.
    pub fn load_config(&mut self, path: &Path) -> Result<(), Error> {
        let config = MappingConfig::from_file(path)?;
        self.resolver.apply_config(&config);
        Ok(())
    }

    /// Save the entries of the current mapping that differ from the
    /// built-in defaults.
    pub fn save_config(&self, path: &Path) -> Result<(), Error> {
        self.resolver.to_config().save_file(path)
    }

    pub fn load(&self, path: &Path) -> Result<Document, Error> {
        self.loader.load(path)
    }

    /// Load `path` and summarize the result.
    pub fn load_with_summary(&self, path: &Path) -> Result<(Document, DocumentSummary), Error> {
        let document = self.load(path)?;
        let summary = document.summary();
        Ok((document, summary))
    }

    /// Convert `document` into a DXF file at `output_path`.
    pub fn convert(&self, document: &Document, output_path: &Path) -> Result<ConversionResult, Error> {
        let mut drawing = DxfDrawing::new();
        let mut result = convert(document, &self.resolver, &mut drawing);
        drawing.save(output_path)?;
        result.output_path = Some(output_path.to_path_buf());
        Ok(result)
    }

    /// Replace the mapping rules, then convert.
    pub fn convert_with_rules(
        &mut self,
        document: &Document,
        output_path: &Path,
        rules: Vec<MappingRule>,
    ) -> Result<ConversionResult, Error> {
        self.resolver.set_rules(rules);
        self.convert(document, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpec;
    use crate::mapping::Selector;

    const PLAN: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100mm" height="50mm" viewBox="0 0 100 50">
        <style>.wall { stroke: #000; stroke-width: 0.5 }</style>
        <g class="IfcWall">
            <polygon class="wall material-concrete cut" points="0,0 10,0 10,10 0,10" style="fill: #808080" />
        </g>
        <line x1="0" y1="0" x2="100" y2="0" stroke="red" />
        <circle cx="50" cy="25" r="5" />
        <text x="10" y="40" text-anchor="middle" font-size="3">Room 1</text>
        <polyline points="1,1" />
    </svg>"##;

    fn document() -> Document {
        let _ = env_logger::try_init();
        Loader::new().load_str(PLAN, Path::new("plan.svg")).unwrap()
    }

    #[test]
    fn test_catch_all_only() {
        let document = document();
        let resolver = MappingResolver::with_rules(vec![]);
        assert_eq!(resolver.rules().len(), 1);
        for primitive in document.primitives.iter().filter(|p| p.classes.is_empty()) {
            let attributes = resolver.resolve(primitive);
            assert_eq!(attributes.layer, "0");
        }
        let plain = crate::primitive::Primitive::new(
            crate::primitive::Shape::Line,
            vec![(0.0, 0.0).into(), (1.0, 1.0).into()],
        );
        let attributes = resolver.resolve(&plain);
        assert_eq!(attributes.layer, "0");
        assert_eq!(attributes.color, ColorSpec::ByLayer);
    }

    #[test]
    fn test_convert_into_drawing() {
        let document = document();
        let mut drawing = DxfDrawing::new();
        let result = convert(&document, &MappingResolver::with_defaults(), &mut drawing);

        assert_eq!(result.output_path, None);
        assert_eq!(result.written_entities, drawing.entities().len());
        assert_eq!(drawing.count("HATCH"), 1);
        assert_eq!(drawing.count("LWPOLYLINE"), 1);
        assert_eq!(drawing.count("LINE"), 1);
        assert_eq!(drawing.count("CIRCLE"), 1);
        assert_eq!(drawing.count("TEXT"), 1);
        assert_eq!(result.created_layers, vec!["0", "A-CONC", "A-TEXT"]);
        assert_eq!(result.log_messages.len(), result.written_entities);
        for layer in &result.created_layers {
            assert!(drawing.layer(layer).is_some());
        }
    }

    #[test]
    fn test_failures_become_warnings() {
        let mut document = document();
        document.primitives.push(crate::primitive::Primitive::new(
            crate::primitive::Shape::Circle {
                radius_x: 0.0,
                radius_y: 0.0,
            },
            vec![(0.0, 0.0).into()],
        ));
        let mut drawing = DxfDrawing::new();
        let result = convert(&document, &MappingResolver::with_defaults(), &mut drawing);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("Could not write circle"));
        assert_eq!(result.written_entities, 5);
    }

    #[test]
    fn test_pipeline_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let svg_path = dir.path().join("plan.svg");
        let css_path = dir.path().join("extra.css");
        let dxf_path = dir.path().join("plan.dxf");
        fs::write(&svg_path, PLAN).unwrap();
        fs::write(&css_path, "line { stroke-dasharray: 2 1 }").unwrap();

        let mut pipeline = Pipeline::new(MappingResolver::with_defaults());
        pipeline.add_stylesheet_file(&css_path).unwrap();
        let (document, summary) = pipeline.load_with_summary(&svg_path).unwrap();
        assert_eq!(summary.total_entities, document.primitives.len());

        let rules = vec![MappingRule::new(Selector::Tag("line".parse().unwrap()), "L-LINE")];
        let result = pipeline.convert_with_rules(&document, &dxf_path, rules).unwrap();
        assert_eq!(result.output_path.as_deref(), Some(dxf_path.as_path()));
        assert!(result.created_layers.contains(&"L-LINE".to_string()));

        let text = fs::read_to_string(&dxf_path).unwrap();
        assert!(text.contains("L-LINE"));
        assert!(text.contains("DASHED"));
        assert!(text.contains("LWPOLYLINE"));
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mut pipeline = Pipeline::default();
        pipeline
            .resolver_mut()
            .set_rules(vec![MappingRule::new(Selector::Any, "ALL")]);
        pipeline.save_config(&path).unwrap();

        let mut other = Pipeline::default();
        other.load_config(&path).unwrap();
        assert_eq!(other.resolver().rules().len(), 1);
        assert_eq!(other.resolver().rules()[0].layer, "ALL");
        assert_eq!(other.default_rules().len(), MappingResolver::default_rules().len());
    }
}
