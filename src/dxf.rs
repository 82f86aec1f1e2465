//! A [`DrawingSink`] producing ASCII DXF (AutoCAD 2000, `AC1015`).
//!
//! Entities are collected in memory and serialized on
//! [`save`](DrawingSink::save) or [`DxfDrawing::to_dxf_string`]. The file
//! carries the sections AutoCAD 2000 readers expect: `HEADER`, `CLASSES`,
//! `TABLES`, `BLOCKS`, `ENTITIES` and `OBJECTS`. Drawing units are
//! millimeters.

use std::f64::consts::PI;
use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, trace};

use crate::color::ColorSpec;
use crate::error::SinkError;
use crate::mapping::DEFAULT_STYLE_NAME;
use crate::sink::{DrawingSink, EntityAttributes, HatchFill, TextAnchor};
use crate::CoordinatePair;

/// Lineweights (hundredths of a millimeter) DXF accepts.
const STANDARD_LINEWEIGHTS: [i16; 24] = [
    0, 5, 9, 13, 15, 18, 20, 25, 30, 35, 40, 50, 53, 60, 70, 80, 90, 100, 106, 120, 140, 158,
    200, 211,
];

/// Layer lineweight meaning "default".
const LINEWEIGHT_DEFAULT: i16 = -3;

/// Longest MTEXT chunk per group.
const MTEXT_CHUNK: usize = 250;

/// Characters AutoCAD rejects in symbol table names.
const INVALID_NAME_CHARS: &[char] = &['<', '>', '/', '\\', '"', ':', ';', '?', '*', '|', '=', '`'];

/// Snap a lineweight to the nearest standard DXF value.
pub fn snap_lineweight(hundredths: i16) -> i16 {
    STANDARD_LINEWEIGHTS
        .iter()
        .copied()
        .min_by_key(|standard| (i32::from(*standard) - i32::from(hundredths)).abs())
        .unwrap_or(0)
}

/// One line family of a hatch pattern, in millimeters.
struct PatternLine {
    angle: f64,
    base: (f64, f64),
    /// Offset between parallel lines, in the line's own frame.
    offset: (f64, f64),
    dashes: &'static [f64],
}

const fn line(angle: f64, base: (f64, f64), offset: (f64, f64), dashes: &'static [f64]) -> PatternLine {
    PatternLine {
        angle,
        base,
        offset,
        dashes,
    }
}

const BRICK_DASH: &[f64] = &[6.35, -6.35];

const ANSI31: &[PatternLine] = &[line(45.0, (0.0, 0.0), (0.0, 3.175), &[])];
const ANSI32: &[PatternLine] = &[
    line(45.0, (0.0, 0.0), (0.0, 9.525), &[]),
    line(45.0, (4.490_128, 0.0), (0.0, 9.525), &[]),
];
const ANSI37: &[PatternLine] = &[
    line(45.0, (0.0, 0.0), (0.0, 3.175), &[]),
    line(135.0, (0.0, 0.0), (0.0, 3.175), &[]),
];
const LINE: &[PatternLine] = &[line(0.0, (0.0, 0.0), (0.0, 3.175), &[])];
const NET: &[PatternLine] = &[
    line(0.0, (0.0, 0.0), (0.0, 3.175), &[]),
    line(90.0, (0.0, 0.0), (0.0, 3.175), &[]),
];
const DASH: &[PatternLine] = &[line(0.0, (0.0, 0.0), (3.175, 3.175), &[3.175, -3.175])];
const BRICK: &[PatternLine] = &[
    line(0.0, (0.0, 0.0), (0.0, 6.35), &[]),
    line(90.0, (0.0, 0.0), (6.35, 6.35), BRICK_DASH),
    line(90.0, (6.35, 0.0), (6.35, 6.35), &[-6.35, 6.35]),
];
const EARTH: &[PatternLine] = &[
    line(0.0, (0.0, 0.0), (6.35, 6.35), BRICK_DASH),
    line(0.0, (0.0, 2.381_25), (6.35, 6.35), BRICK_DASH),
    line(0.0, (0.0, 4.7625), (6.35, 6.35), BRICK_DASH),
    line(90.0, (0.793_75, 5.556_25), (6.35, 6.35), BRICK_DASH),
    line(90.0, (3.175, 5.556_25), (6.35, 6.35), BRICK_DASH),
    line(90.0, (5.556_25, 5.556_25), (6.35, 6.35), BRICK_DASH),
];

fn pattern_definition(name: &str) -> Option<&'static [PatternLine]> {
    match name.to_ascii_uppercase().as_str() {
        "ANSI31" => Some(ANSI31),
        "ANSI32" => Some(ANSI32),
        "ANSI37" => Some(ANSI37),
        "LINE" => Some(LINE),
        "NET" => Some(NET),
        "DASH" => Some(DASH),
        "BRICK" => Some(BRICK),
        "EARTH" => Some(EARTH),
        _ => None,
    }
}

/// `(name, description, dash elements)` of the built-in linetypes.
const LINETYPES: [(&str, &str, &[f64]); 6] = [
    ("ByBlock", "", &[]),
    ("ByLayer", "", &[]),
    ("Continuous", "Solid line", &[]),
    ("DASHED", "Dashed __ __ __", &[12.7, -6.35]),
    ("HIDDEN", "Hidden __ __ __", &[6.35, -3.175]),
    ("CENTER", "Center ____ _ ____", &[31.75, -6.35, 6.35, -6.35]),
];

fn rotate(v: (f64, f64), degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (v.0 * cos - v.1 * sin, v.0 * sin + v.1 * cos)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub color: ColorSpec,
    pub linetype: String,
    pub lineweight: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStyle {
    pub name: String,
    pub font: String,
}

/// An entity as handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Line {
        start: CoordinatePair,
        end: CoordinatePair,
        attributes: EntityAttributes,
    },
    Polyline {
        points: Vec<CoordinatePair>,
        closed: bool,
        attributes: EntityAttributes,
    },
    Hatch {
        boundary: Vec<CoordinatePair>,
        fill: HatchFill,
        attributes: EntityAttributes,
    },
    Circle {
        center: CoordinatePair,
        radius: f64,
        attributes: EntityAttributes,
    },
    Ellipse {
        center: CoordinatePair,
        major_axis: CoordinatePair,
        ratio: f64,
        attributes: EntityAttributes,
    },
    Text {
        content: String,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        anchor: TextAnchor,
        style: String,
        attributes: EntityAttributes,
    },
    MText {
        content: String,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        style: String,
        attributes: EntityAttributes,
    },
}

impl Entity {
    /// DXF entity type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Line { .. } => "LINE",
            Entity::Polyline { .. } => "LWPOLYLINE",
            Entity::Hatch { .. } => "HATCH",
            Entity::Circle { .. } => "CIRCLE",
            Entity::Ellipse { .. } => "ELLIPSE",
            Entity::Text { .. } => "TEXT",
            Entity::MText { .. } => "MTEXT",
        }
    }

    pub fn attributes(&self) -> &EntityAttributes {
        match self {
            Entity::Line { attributes, .. }
            | Entity::Polyline { attributes, .. }
            | Entity::Hatch { attributes, .. }
            | Entity::Circle { attributes, .. }
            | Entity::Ellipse { attributes, .. }
            | Entity::Text { attributes, .. }
            | Entity::MText { attributes, .. } => attributes,
        }
    }

    fn extent_points(&self) -> Vec<CoordinatePair> {
        match self {
            Entity::Line { start, end, .. } => vec![*start, *end],
            Entity::Polyline { points, .. } => points.clone(),
            Entity::Hatch { boundary, .. } => boundary.clone(),
            Entity::Circle { center, radius, .. } => vec![
                CoordinatePair::new(center.x - radius, center.y - radius),
                CoordinatePair::new(center.x + radius, center.y + radius),
            ],
            Entity::Ellipse {
                center, major_axis, ..
            } => {
                let r = major_axis.x.hypot(major_axis.y);
                vec![
                    CoordinatePair::new(center.x - r, center.y - r),
                    CoordinatePair::new(center.x + r, center.y + r),
                ]
            }
            Entity::Text { position, .. } | Entity::MText { position, .. } => vec![*position],
        }
    }
}

/// Format a real the way DXF readers expect (always with a decimal point).
struct Real(f64);

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.0 == 0.0 { 0.0 } else { self.0 };
        if value.fract() == 0.0 && value.abs() < 1e15 {
            write!(f, "{:.1}", value)
        } else {
            write!(f, "{}", value)
        }
    }
}

/// Group code / value writer.
struct DxfWriter {
    output: Vec<String>,
    handle_counter: u64,
}

impl DxfWriter {
    fn new() -> Self {
        Self {
            output: Vec::new(),
            handle_counter: 0x100,
        }
    }

    fn new_handle(&mut self) -> String {
        let handle = format!("{:X}", self.handle_counter);
        self.handle_counter += 1;
        handle
    }

    fn write_pair(&mut self, code: i32, value: impl fmt::Display) {
        self.output.push(format!("{:>3}", code));
        self.output.push(value.to_string());
    }

    fn write_real(&mut self, code: i32, value: f64) {
        self.write_pair(code, Real(value));
    }

    /// Point with codes `base`, `base + 10` and `base + 20` (Z = 0).
    fn write_point(&mut self, base_code: i32, point: CoordinatePair) {
        self.write_real(base_code, point.x);
        self.write_real(base_code + 10, point.y);
        self.write_real(base_code + 20, 0.0);
    }

    fn begin_section(&mut self, name: &str) {
        self.write_pair(0, "SECTION");
        self.write_pair(2, name);
    }

    fn end_section(&mut self) {
        self.write_pair(0, "ENDSEC");
    }

    /// Table header; returns the table handle.
    fn begin_table(&mut self, name: &str, count: usize) -> String {
        let handle = self.new_handle();
        self.write_pair(0, "TABLE");
        self.write_pair(2, name);
        self.write_pair(5, &handle);
        self.write_pair(330, "0");
        self.write_pair(100, "AcDbSymbolTable");
        self.write_pair(70, count);
        handle
    }

    fn end_table(&mut self) {
        self.write_pair(0, "ENDTAB");
    }

    /// Common symbol table record header.
    fn begin_record(&mut self, kind: &str, subclass: &str, owner: &str) -> String {
        let handle = self.new_handle();
        self.write_pair(0, kind);
        self.write_pair(5, &handle);
        self.write_pair(330, owner);
        self.write_pair(100, "AcDbSymbolTableRecord");
        self.write_pair(100, subclass);
        handle
    }

    fn finish(mut self) -> String {
        self.write_pair(0, "EOF");
        let mut text = self.output.join("\n");
        text.push('\n');
        text
    }
}

/// In-memory DXF drawing.
#[derive(Debug, Clone)]
pub struct DxfDrawing {
    layers: Vec<Layer>,
    text_styles: Vec<TextStyle>,
    entities: Vec<Entity>,
}

impl Default for DxfDrawing {
    fn default() -> Self {
        Self::new()
    }
}

impl DxfDrawing {
    /// An empty drawing with layer `0` and the `STANDARD` text style.
    pub fn new() -> Self {
        Self {
            layers: vec![Layer {
                name: "0".to_string(),
                color: ColorSpec::Index(7),
                linetype: "Continuous".to_string(),
                lineweight: None,
            }],
            text_styles: vec![TextStyle {
                name: DEFAULT_STYLE_NAME.to_string(),
                font: "txt".to_string(),
            }],
            entities: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name.eq_ignore_ascii_case(name))
    }

    pub fn text_styles(&self) -> &[TextStyle] {
        &self.text_styles
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities of a DXF type such as `HATCH`.
    pub fn count(&self, kind: &str) -> usize {
        self.entities.iter().filter(|e| e.kind() == kind).count()
    }

    fn push(&mut self, entity: Entity) {
        trace!("DxfDrawing: {} on {}", entity.kind(), entity.attributes().layer);
        self.entities.push(entity);
    }

    /// Linetypes to declare: the built-ins plus any other referenced name.
    fn linetype_names(&self) -> Vec<String> {
        let mut names: Vec<String> = LINETYPES.iter().map(|(name, _, _)| name.to_string()).collect();
        let referenced = self
            .layers
            .iter()
            .map(|layer| layer.linetype.as_str())
            .chain(self.entities.iter().map(|e| e.attributes().linetype.as_str()));
        for name in referenced {
            if !name.is_empty() && !names.iter().any(|known| known.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
        names
    }

    fn canonical_linetype(name: &str) -> String {
        LINETYPES
            .iter()
            .find(|(known, _, _)| known.eq_ignore_ascii_case(name))
            .map_or_else(|| name.to_string(), |(known, _, _)| known.to_string())
    }

    fn extents(&self) -> Option<(CoordinatePair, CoordinatePair)> {
        let mut points = self.entities.iter().flat_map(Entity::extent_points);
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (
                CoordinatePair::new(min.x.min(p.x), min.y.min(p.y)),
                CoordinatePair::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// Serialize the drawing.
    pub fn to_dxf_string(&self) -> String {
        let mut w = DxfWriter::new();
        let (ext_min, ext_max) = self
            .extents()
            .unwrap_or(((0.0, 0.0).into(), (100.0, 100.0).into()));

        w.begin_section("HEADER");
        w.write_pair(9, "$ACADVER");
        w.write_pair(1, "AC1015");
        w.write_pair(9, "$HANDSEED");
        w.write_pair(5, "");
        let handseed_index = w.output.len() - 1;
        w.write_pair(9, "$INSUNITS");
        w.write_pair(70, 4);
        w.write_pair(9, "$MEASUREMENT");
        w.write_pair(70, 1);
        w.write_pair(9, "$EXTMIN");
        w.write_point(10, ext_min);
        w.write_pair(9, "$EXTMAX");
        w.write_point(10, ext_max);
        w.end_section();

        w.begin_section("CLASSES");
        w.end_section();

        w.begin_section("TABLES");
        let model_space;
        let paper_space;
        {
            let table = w.begin_table("VPORT", 1);
            w.begin_record("VPORT", "AcDbViewportTableRecord", &table);
            w.write_pair(2, "*Active");
            w.write_pair(70, 0);
            w.write_real(10, 0.0);
            w.write_real(20, 0.0);
            w.write_real(11, 1.0);
            w.write_real(21, 1.0);
            w.write_real(12, (ext_min.x + ext_max.x) / 2.0);
            w.write_real(22, (ext_min.y + ext_max.y) / 2.0);
            w.write_real(40, ((ext_max.y - ext_min.y) * 1.1).max(1.0));
            w.write_real(41, 1.5);
            w.end_table();

            let linetypes = self.linetype_names();
            let table = w.begin_table("LTYPE", linetypes.len());
            for name in &linetypes {
                let (description, dashes) = LINETYPES
                    .iter()
                    .find(|(known, _, _)| known == name)
                    .map_or(("", &[][..]), |(_, description, dashes)| (*description, *dashes));
                w.begin_record("LTYPE", "AcDbLinetypeTableRecord", &table);
                w.write_pair(2, name);
                w.write_pair(70, 0);
                w.write_pair(3, description);
                w.write_pair(72, 65);
                w.write_pair(73, dashes.len());
                w.write_real(40, dashes.iter().map(|d| d.abs()).sum());
                for dash in dashes {
                    w.write_real(49, *dash);
                    w.write_pair(74, 0);
                }
            }
            w.end_table();

            let table = w.begin_table("LAYER", self.layers.len());
            for layer in &self.layers {
                w.begin_record("LAYER", "AcDbLayerTableRecord", &table);
                w.write_pair(2, &layer.name);
                w.write_pair(70, 0);
                let aci = match layer.color {
                    ColorSpec::ByLayer | ColorSpec::ByBlock => 7,
                    color => color.aci(),
                };
                w.write_pair(62, aci);
                if let Some(true_color) = layer.color.true_color() {
                    w.write_pair(420, true_color);
                }
                w.write_pair(6, Self::canonical_linetype(&layer.linetype));
                w.write_pair(
                    370,
                    layer.lineweight.map_or(LINEWEIGHT_DEFAULT, snap_lineweight),
                );
            }
            w.end_table();

            let table = w.begin_table("STYLE", self.text_styles.len());
            for style in &self.text_styles {
                w.begin_record("STYLE", "AcDbTextStyleTableRecord", &table);
                w.write_pair(2, &style.name);
                w.write_pair(70, 0);
                w.write_real(40, 0.0);
                w.write_real(41, 1.0);
                w.write_real(50, 0.0);
                w.write_pair(71, 0);
                w.write_real(42, 2.5);
                w.write_pair(3, &style.font);
                w.write_pair(4, "");
            }
            w.end_table();

            w.begin_table("VIEW", 0);
            w.end_table();
            w.begin_table("UCS", 0);
            w.end_table();

            let table = w.begin_table("APPID", 1);
            w.begin_record("APPID", "AcDbRegAppTableRecord", &table);
            w.write_pair(2, "ACAD");
            w.write_pair(70, 0);
            w.end_table();

            let table = w.begin_table("DIMSTYLE", 1);
            w.write_pair(100, "AcDbDimStyleTable");
            let handle = w.new_handle();
            w.write_pair(0, "DIMSTYLE");
            w.write_pair(105, handle);
            w.write_pair(330, &table);
            w.write_pair(100, "AcDbSymbolTableRecord");
            w.write_pair(100, "AcDbDimStyleTableRecord");
            w.write_pair(2, DEFAULT_STYLE_NAME);
            w.write_pair(70, 0);
            w.end_table();

            let table = w.begin_table("BLOCK_RECORD", 2);
            model_space = w.begin_record("BLOCK_RECORD", "AcDbBlockTableRecord", &table);
            w.write_pair(2, "*Model_Space");
            paper_space = w.begin_record("BLOCK_RECORD", "AcDbBlockTableRecord", &table);
            w.write_pair(2, "*Paper_Space");
            w.end_table();
        }
        w.end_section();

        w.begin_section("BLOCKS");
        let blocks = [
            ("*Model_Space", &model_space, false),
            ("*Paper_Space", &paper_space, true),
        ];
        for (name, owner, paper) in &blocks {
            let handle = w.new_handle();
            w.write_pair(0, "BLOCK");
            w.write_pair(5, handle);
            w.write_pair(330, owner);
            w.write_pair(100, "AcDbEntity");
            if *paper {
                w.write_pair(67, 1);
            }
            w.write_pair(8, "0");
            w.write_pair(100, "AcDbBlockBegin");
            w.write_pair(2, name);
            w.write_pair(70, 0);
            w.write_point(10, (0.0, 0.0).into());
            w.write_pair(3, name);
            w.write_pair(1, "");
            let handle = w.new_handle();
            w.write_pair(0, "ENDBLK");
            w.write_pair(5, handle);
            w.write_pair(330, owner);
            w.write_pair(100, "AcDbEntity");
            if *paper {
                w.write_pair(67, 1);
            }
            w.write_pair(8, "0");
            w.write_pair(100, "AcDbBlockEnd");
        }
        w.end_section();

        w.begin_section("ENTITIES");
        for entity in &self.entities {
            write_entity(&mut w, entity, &model_space);
        }
        w.end_section();

        w.begin_section("OBJECTS");
        let root = w.new_handle();
        let groups = w.new_handle();
        w.write_pair(0, "DICTIONARY");
        w.write_pair(5, &root);
        w.write_pair(330, "0");
        w.write_pair(100, "AcDbDictionary");
        w.write_pair(281, 1);
        w.write_pair(3, "ACAD_GROUP");
        w.write_pair(350, &groups);
        w.write_pair(0, "DICTIONARY");
        w.write_pair(5, &groups);
        w.write_pair(330, &root);
        w.write_pair(100, "AcDbDictionary");
        w.write_pair(281, 1);
        w.end_section();

        w.output[handseed_index] = format!("{:X}", w.handle_counter);
        w.finish()
    }
}

fn write_entity_header(w: &mut DxfWriter, kind: &str, attributes: &EntityAttributes, owner: &str) {
    let handle = w.new_handle();
    w.write_pair(0, kind);
    w.write_pair(5, handle);
    w.write_pair(330, owner);
    w.write_pair(100, "AcDbEntity");
    w.write_pair(8, &attributes.layer);
    if !attributes.linetype.is_empty() && !attributes.linetype.eq_ignore_ascii_case("ByLayer") {
        w.write_pair(6, DxfDrawing::canonical_linetype(&attributes.linetype));
    }
    w.write_pair(62, attributes.color.aci());
    if let Some(true_color) = attributes.color.true_color() {
        w.write_pair(420, true_color);
    }
    if let Some(lineweight) = attributes.lineweight {
        w.write_pair(370, snap_lineweight(lineweight));
    }
}

fn write_entity(w: &mut DxfWriter, entity: &Entity, owner: &str) {
    write_entity_header(w, entity.kind(), entity.attributes(), owner);
    match entity {
        Entity::Line { start, end, .. } => {
            w.write_pair(100, "AcDbLine");
            w.write_point(10, *start);
            w.write_point(11, *end);
        }
        Entity::Polyline { points, closed, .. } => {
            w.write_pair(100, "AcDbPolyline");
            w.write_pair(90, points.len());
            w.write_pair(70, if *closed { 1 } else { 0 });
            w.write_real(43, 0.0);
            for p in points {
                w.write_real(10, p.x);
                w.write_real(20, p.y);
            }
        }
        Entity::Hatch { boundary, fill, .. } => write_hatch(w, boundary, fill),
        Entity::Circle { center, radius, .. } => {
            w.write_pair(100, "AcDbCircle");
            w.write_point(10, *center);
            w.write_real(40, *radius);
        }
        Entity::Ellipse {
            center,
            major_axis,
            ratio,
            ..
        } => {
            // DXF needs ratio <= 1; a taller ellipse swaps its axes.
            let (axis, ratio) = if *ratio > 1.0 {
                (
                    CoordinatePair::new(-major_axis.y * ratio, major_axis.x * ratio),
                    1.0 / ratio,
                )
            } else {
                (*major_axis, *ratio)
            };
            w.write_pair(100, "AcDbEllipse");
            w.write_point(10, *center);
            w.write_point(11, axis);
            w.write_real(210, 0.0);
            w.write_real(220, 0.0);
            w.write_real(230, 1.0);
            w.write_real(40, ratio);
            w.write_real(41, 0.0);
            w.write_real(42, 2.0 * PI);
        }
        Entity::Text {
            content,
            position,
            height,
            rotation,
            anchor,
            style,
            ..
        } => {
            let halign = match anchor {
                TextAnchor::Left => 0,
                TextAnchor::Center => 1,
                TextAnchor::Right => 2,
            };
            w.write_pair(100, "AcDbText");
            w.write_point(10, *position);
            w.write_real(40, *height);
            w.write_pair(1, content);
            w.write_real(50, *rotation);
            w.write_pair(7, style);
            if halign != 0 {
                w.write_pair(72, halign);
                w.write_point(11, *position);
            }
            w.write_pair(100, "AcDbText");
            w.write_pair(73, 0);
        }
        Entity::MText {
            content,
            position,
            height,
            rotation,
            style,
            ..
        } => {
            w.write_pair(100, "AcDbMText");
            w.write_point(10, *position);
            w.write_real(40, *height);
            w.write_real(41, 0.0);
            w.write_pair(71, 1);
            w.write_pair(72, 1);
            let text = content.replace("\r\n", "\n").replace('\n', "\\P");
            let chars: Vec<char> = text.chars().collect();
            let chunks: Vec<String> = chars.chunks(MTEXT_CHUNK).map(|c| c.iter().collect()).collect();
            for (i, chunk) in chunks.iter().enumerate() {
                w.write_pair(if i + 1 == chunks.len() { 1 } else { 3 }, chunk);
            }
            if chunks.is_empty() {
                w.write_pair(1, "");
            }
            w.write_pair(7, style);
            w.write_real(50, rotation.to_radians());
        }
    }
}

fn write_hatch(w: &mut DxfWriter, boundary: &[CoordinatePair], fill: &HatchFill) {
    let ring = match boundary {
        [first, .., last] if first == last => &boundary[..boundary.len() - 1],
        _ => boundary,
    };
    let (name, solid) = match fill {
        HatchFill::Solid => ("SOLID", true),
        HatchFill::Pattern { name, .. } => (name.as_str(), false),
    };
    w.write_pair(100, "AcDbHatch");
    w.write_point(10, (0.0, 0.0).into());
    w.write_real(210, 0.0);
    w.write_real(220, 0.0);
    w.write_real(230, 1.0);
    w.write_pair(2, name.to_ascii_uppercase());
    w.write_pair(70, if solid { 1 } else { 0 });
    w.write_pair(71, 0);
    w.write_pair(91, 1);
    // External polyline boundary.
    w.write_pair(92, 3);
    w.write_pair(72, 0);
    w.write_pair(73, 1);
    w.write_pair(93, ring.len());
    for p in ring {
        w.write_real(10, p.x);
        w.write_real(20, p.y);
    }
    w.write_pair(97, 0);
    w.write_pair(75, 0);
    w.write_pair(76, 1);
    if let HatchFill::Pattern { name, scale, angle } = fill {
        let lines = pattern_definition(name).unwrap_or(&[]);
        w.write_real(52, *angle);
        w.write_real(41, *scale);
        w.write_pair(77, 0);
        w.write_pair(78, lines.len());
        for line in lines {
            let base = rotate(line.base, *angle);
            let offset = rotate(line.offset, line.angle + angle);
            w.write_real(53, line.angle + angle);
            w.write_real(43, base.0 * scale);
            w.write_real(44, base.1 * scale);
            w.write_real(45, offset.0 * scale);
            w.write_real(46, offset.1 * scale);
            w.write_pair(79, line.dashes.len());
            for dash in line.dashes {
                w.write_real(49, dash * scale);
            }
        }
    }
    w.write_pair(98, 0);
}

fn valid_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(INVALID_NAME_CHARS)
}

fn check_finite(points: &[CoordinatePair]) -> Result<(), SinkError> {
    if points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
        Ok(())
    } else {
        Err(SinkError::Degenerate("non-finite coordinate".to_string()))
    }
}

impl DrawingSink for DxfDrawing {
    fn ensure_layer(
        &mut self,
        name: &str,
        color: ColorSpec,
        linetype: &str,
        lineweight: Option<i16>,
    ) -> Result<(), SinkError> {
        if self.layer(name).is_some() {
            return Ok(());
        }
        if !valid_name(name) {
            return Err(SinkError::Degenerate(format!("invalid layer name {:?}", name)));
        }
        debug!("DxfDrawing: new layer {} ({}, {})", name, color, linetype);
        self.layers.push(Layer {
            name: name.to_string(),
            color,
            linetype: if linetype.trim().is_empty() {
                "Continuous".to_string()
            } else {
                linetype.to_string()
            },
            lineweight,
        });
        Ok(())
    }

    fn add_line(
        &mut self,
        start: CoordinatePair,
        end: CoordinatePair,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        check_finite(&[start, end])?;
        self.push(Entity::Line {
            start,
            end,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_polyline(
        &mut self,
        points: &[CoordinatePair],
        closed: bool,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        if points.len() < 2 {
            return Err(SinkError::Degenerate("polyline needs two points".to_string()));
        }
        check_finite(points)?;
        self.push(Entity::Polyline {
            points: points.to_vec(),
            closed,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_hatch(
        &mut self,
        boundary: &[CoordinatePair],
        fill: &HatchFill,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        if let HatchFill::Pattern { name, .. } = fill {
            if pattern_definition(name).is_none() {
                return Err(SinkError::UnknownPattern(name.clone()));
            }
        }
        if boundary.len() < 3 {
            return Err(SinkError::Degenerate("hatch boundary needs three points".to_string()));
        }
        check_finite(boundary)?;
        self.push(Entity::Hatch {
            boundary: boundary.to_vec(),
            fill: fill.clone(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_circle(
        &mut self,
        center: CoordinatePair,
        radius: f64,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SinkError::Degenerate(format!("circle radius {}", radius)));
        }
        check_finite(&[center])?;
        self.push(Entity::Circle {
            center,
            radius,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_ellipse(
        &mut self,
        center: CoordinatePair,
        major_axis: CoordinatePair,
        ratio: f64,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        let length = major_axis.x.hypot(major_axis.y);
        if !(length.is_finite() && length > 0.0 && ratio.is_finite() && ratio > 0.0) {
            return Err(SinkError::Degenerate(format!(
                "ellipse axis {:?} ratio {}",
                major_axis, ratio
            )));
        }
        check_finite(&[center])?;
        self.push(Entity::Ellipse {
            center,
            major_axis,
            ratio,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_text(
        &mut self,
        content: &str,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        anchor: TextAnchor,
        style: &str,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        if !(height.is_finite() && height > 0.0) {
            return Err(SinkError::Degenerate(format!("text height {}", height)));
        }
        check_finite(&[position])?;
        self.push(Entity::Text {
            content: content.to_string(),
            position,
            height,
            rotation,
            anchor,
            style: style.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn add_paragraph(
        &mut self,
        content: &str,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        style: &str,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        if !(height.is_finite() && height > 0.0) {
            return Err(SinkError::Degenerate(format!("text height {}", height)));
        }
        check_finite(&[position])?;
        self.push(Entity::MText {
            content: content.to_string(),
            position,
            height,
            rotation,
            style: style.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn ensure_text_style(&mut self, name: &str, font: Option<&str>) -> Result<String, SinkError> {
        if let Some(existing) = self
            .text_styles
            .iter()
            .find(|style| style.name.eq_ignore_ascii_case(name))
        {
            return Ok(existing.name.clone());
        }
        if !valid_name(name) {
            return Err(SinkError::InvalidStyleName(name.to_string()));
        }
        debug!("DxfDrawing: new text style {} ({:?})", name, font);
        self.text_styles.push(TextStyle {
            name: name.to_string(),
            font: font.unwrap_or("txt").to_string(),
        });
        Ok(name.to_string())
    }

    fn save(&self, path: &Path) -> Result<(), SinkError> {
        fs::write(path, self.to_dxf_string()).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(layer: &str) -> EntityAttributes {
        EntityAttributes {
            layer: layer.to_string(),
            color: ColorSpec::ByLayer,
            linetype: "Continuous".to_string(),
            lineweight: None,
        }
    }

    /// Split serialized DXF into `(code, value)` pairs.
    fn pairs(dxf: &str) -> Vec<(i32, String)> {
        let lines: Vec<&str> = dxf.lines().collect();
        assert_eq!(lines.len() % 2, 0);
        lines
            .chunks(2)
            .map(|pair| (pair[0].trim().parse().unwrap(), pair[1].to_string()))
            .collect()
    }

    fn square() -> Vec<CoordinatePair> {
        vec![
            (0.0, 0.0).into(),
            (10.0, 0.0).into(),
            (10.0, 10.0).into(),
            (0.0, 10.0).into(),
            (0.0, 0.0).into(),
        ]
    }

    #[test]
    fn test_snap_lineweight() {
        assert_eq!(snap_lineweight(35), 35);
        assert_eq!(snap_lineweight(36), 35);
        assert_eq!(snap_lineweight(45), 40);
        assert_eq!(snap_lineweight(1000), 211);
        assert_eq!(snap_lineweight(-5), 0);
    }

    #[test]
    fn test_layers_are_idempotent() {
        let mut drawing = DxfDrawing::new();
        drawing
            .ensure_layer("A-WALL", ColorSpec::Rgb(0, 0, 0), "Continuous", Some(35))
            .unwrap();
        drawing
            .ensure_layer("a-wall", ColorSpec::Index(1), "DASHED", None)
            .unwrap();
        drawing.ensure_layer("0", ColorSpec::Index(3), "DASHED", None).unwrap();
        assert_eq!(drawing.layers().len(), 2);
        assert_eq!(drawing.layer("A-WALL").unwrap().color, ColorSpec::Rgb(0, 0, 0));
        assert_eq!(drawing.layer("0").unwrap().color, ColorSpec::Index(7));
        assert!(drawing.ensure_layer("bad:name", ColorSpec::ByLayer, "", None).is_err());
    }

    #[test]
    fn test_unknown_pattern_is_rejected() {
        let mut drawing = DxfDrawing::new();
        let fill = HatchFill::Pattern {
            name: "AR-CONC".into(),
            scale: 1.0,
            angle: 0.0,
        };
        match drawing.add_hatch(&square(), &fill, &attributes("0")) {
            Err(SinkError::UnknownPattern(name)) => assert_eq!(name, "AR-CONC"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(drawing.entities().is_empty());
    }

    #[test]
    fn test_degenerate_geometry() {
        let mut drawing = DxfDrawing::new();
        let a = attributes("0");
        assert!(drawing.add_polyline(&square()[..1], false, &a).is_err());
        assert!(drawing.add_circle((0.0, 0.0).into(), 0.0, &a).is_err());
        assert!(drawing
            .add_ellipse((0.0, 0.0).into(), (0.0, 0.0).into(), 0.5, &a)
            .is_err());
        assert!(drawing
            .add_line((f64::NAN, 0.0).into(), (1.0, 1.0).into(), &a)
            .is_err());
        assert!(drawing.entities().is_empty());
    }

    #[test]
    fn test_text_styles() {
        let mut drawing = DxfDrawing::new();
        assert_eq!(drawing.ensure_text_style("ARIAL", Some("arial.ttf")).unwrap(), "ARIAL");
        assert_eq!(drawing.ensure_text_style("arial", None).unwrap(), "ARIAL");
        assert_eq!(drawing.ensure_text_style("standard", None).unwrap(), DEFAULT_STYLE_NAME);
        assert!(matches!(
            drawing.ensure_text_style("a/b", None),
            Err(SinkError::InvalidStyleName(_))
        ));
        assert_eq!(drawing.text_styles().len(), 2);
    }

    #[test]
    fn test_serialized_structure() {
        let _ = env_logger::try_init();
        let mut drawing = DxfDrawing::new();
        drawing
            .ensure_layer("A-WALL", ColorSpec::Rgb(255, 0, 0), "DASHED", Some(35))
            .unwrap();
        let wall = EntityAttributes {
            color: ColorSpec::Rgb(0x12, 0x34, 0x56),
            lineweight: Some(36),
            ..attributes("A-WALL")
        };
        drawing.add_polyline(&square()[..4], true, &wall).unwrap();
        drawing.add_hatch(&square(), &HatchFill::Solid, &wall).unwrap();
        drawing
            .add_hatch(
                &square(),
                &HatchFill::Pattern {
                    name: "ansi37".into(),
                    scale: 2.0,
                    angle: 0.0,
                },
                &wall,
            )
            .unwrap();
        drawing
            .add_ellipse((5.0, 5.0).into(), (5.0, 0.0).into(), 2.0, &attributes("0"))
            .unwrap();
        drawing
            .add_paragraph("one\ntwo", (1.0, 2.0).into(), 3.5, 90.0, "STANDARD", &attributes("0"))
            .unwrap();
        drawing
            .add_text("mid", (1.0, 2.0).into(), 2.5, 0.0, TextAnchor::Center, "STANDARD", &attributes("0"))
            .unwrap();

        let dxf = drawing.to_dxf_string();
        let pairs = pairs(&dxf);
        let value_after = |code: i32, marker: &str| {
            pairs
                .windows(2)
                .find(|w| w[0].1 == marker)
                .map(|w| w[1].clone())
                .filter(|next| next.0 == code)
                .map(|next| next.1)
        };
        assert_eq!(pairs.first(), Some(&(0, "SECTION".to_string())));
        assert_eq!(pairs.last(), Some(&(0, "EOF".to_string())));
        assert_eq!(value_after(1, "$ACADVER").as_deref(), Some("AC1015"));
        assert!(value_after(5, "$HANDSEED").map_or(false, |seed| !seed.is_empty()));

        let entity_types: Vec<&str> = pairs
            .iter()
            .skip_while(|p| p.1 != "ENTITIES")
            .take_while(|p| p.1 != "ENDSEC")
            .filter(|p| p.0 == 0)
            .map(|p| p.1.as_str())
            .collect();
        assert_eq!(
            entity_types,
            vec!["LWPOLYLINE", "HATCH", "HATCH", "ELLIPSE", "MTEXT", "TEXT"]
        );

        assert!(pairs.contains(&(420, "1193046".to_string())));
        assert!(pairs.contains(&(370, "35".to_string())));
        assert!(pairs.contains(&(2, "ANSI37".to_string())));
        assert!(pairs.contains(&(78, "2".to_string())));
        assert!(pairs.contains(&(1, "one\\Ptwo".to_string())));
        assert!(pairs.contains(&(40, "0.5".to_string())));
        assert!(pairs.contains(&(72, "1".to_string())));
        // The closing duplicate of the hatch ring is dropped.
        assert!(pairs.contains(&(93, "4".to_string())));
        assert!(pairs.contains(&(2, "A-WALL".to_string())));
        assert!(pairs.contains(&(2, "DASHED".to_string())));

        let handles: Vec<&String> = pairs.iter().filter(|p| p.0 == 5 && !p.1.is_empty()).map(|p| &p.1).collect();
        let mut unique = handles.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), handles.len());
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dxf");
        let mut drawing = DxfDrawing::new();
        drawing
            .add_line((0.0, 0.0).into(), (1.0, 1.0).into(), &attributes("0"))
            .unwrap();
        drawing.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("LINE"));
        assert!(text.trim_end().ends_with("EOF"));
        assert!(drawing.save(&dir.path().join("missing/out.dxf")).is_err());
    }
}
