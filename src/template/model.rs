use crate::common::RGBColor;
use crate::opc::packuri::PackURI;
/// Data model produced by template analysis.
///
/// A `TemplateModel` is a self-contained summary of a template's visual
/// identity: slide geometry, theme palette and fonts, the placeholder
/// inventory of every layout, and the reusable image assets. It holds no
/// references into the source package, so it can be cached and shared
/// across generation runs.
use phf::phf_map;
use serde::Serialize;

/// Default slide width when the presentation omits `<p:sldSz>` (16:9, EMU).
pub const DEFAULT_SLIDE_WIDTH: i64 = 9_144_000;
/// Default slide height when the presentation omits `<p:sldSz>` (EMU).
pub const DEFAULT_SLIDE_HEIGHT: i64 = 6_858_000;

/// Role a placeholder plays on a slide.
///
/// Collapses the OOXML placeholder type vocabulary down to the roles that
/// matter for content assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Slide title (including centered title)
    Title,
    /// Body text, subtitle, or other text content
    Body,
    /// Picture content
    Image,
    /// Dates, footers, slide numbers, charts, tables and anything else
    /// that never receives generated content
    Other,
}

/// OOXML `type` attribute values of `<p:ph>` mapped to their role.
static PH_TYPE_KINDS: phf::Map<&'static str, PlaceholderKind> = phf_map! {
    "title" => PlaceholderKind::Title,
    "ctrTitle" => PlaceholderKind::Title,
    "body" => PlaceholderKind::Body,
    "subTitle" => PlaceholderKind::Body,
    "pic" => PlaceholderKind::Image,
    "clipArt" => PlaceholderKind::Image,
    "dt" => PlaceholderKind::Other,
    "ftr" => PlaceholderKind::Other,
    "sldNum" => PlaceholderKind::Other,
    "hdr" => PlaceholderKind::Other,
    "obj" => PlaceholderKind::Other,
    "chart" => PlaceholderKind::Other,
    "tbl" => PlaceholderKind::Other,
    "dgm" => PlaceholderKind::Other,
    "media" => PlaceholderKind::Other,
    "sldImg" => PlaceholderKind::Other,
};

impl PlaceholderKind {
    /// Map a `<p:ph>` type attribute to its role.
    ///
    /// An absent type attribute means "body" in OOXML; unrecognized values
    /// map to [`PlaceholderKind::Other`].
    pub fn from_ph_type(ph_type: Option<&str>) -> Self {
        match ph_type {
            None => PlaceholderKind::Body,
            Some(t) => PH_TYPE_KINDS.get(t).copied().unwrap_or(PlaceholderKind::Other),
        }
    }

    /// Whether generated text flows into placeholders of this kind.
    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self, PlaceholderKind::Title | PlaceholderKind::Body)
    }
}

/// Position and extent of a shape in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// Character-level run properties collected from a style source.
///
/// All fields are optional; absent fields defer to the next level of the
/// inheritance chain (placeholder, then master kind style, then theme).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    /// Font size in centipoints (e.g., 3200 for 32pt)
    pub size_centipt: Option<u32>,
    pub bold: Option<bool>,
    pub typeface: Option<String>,
    pub color: Option<RGBColor>,
}

impl TextStyle {
    /// Whether no property is set at this level.
    pub fn is_empty(&self) -> bool {
        self.size_centipt.is_none()
            && self.bold.is_none()
            && self.typeface.is_none()
            && self.color.is_none()
    }
}

/// Effective character formatting after walking the inheritance chain.
///
/// Every field is concrete; consumers never need a fallback of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub typeface: String,
    pub size_centipt: u32,
    pub bold: bool,
    pub color: RGBColor,
}

/// A placeholder slot described by a layout.
#[derive(Debug, Clone)]
pub struct PlaceholderDescriptor {
    /// Role derived from the raw placeholder type
    pub kind: PlaceholderKind,
    /// Raw `type` attribute value, kept for writing back to slides
    pub ph_type: Option<String>,
    /// Placeholder index, 0 when absent
    pub idx: u32,
    /// Resolved frame, from the layout shape or inherited from the master
    pub frame: Option<Rect>,
    /// Solid fill declared on the placeholder shape, when one is
    pub fill: Option<RGBColor>,
    /// Style overrides declared on the layout placeholder itself
    pub style: TextStyle,
}

/// One slide layout with its placeholder inventory.
#[derive(Debug, Clone)]
pub struct LayoutDescriptor {
    /// Partname of the layout part (e.g., "/ppt/slideLayouts/slideLayout1.xml")
    pub partname: PackURI,
    /// Layout display name from `<p:cSld name="...">`
    pub name: String,
    /// Position within the master's layout list
    pub index: usize,
    pub placeholders: Vec<PlaceholderDescriptor>,
    /// Solid background fill from the layout's `<p:bg>`, when one is declared
    pub background: Option<RGBColor>,
    /// True for the generic layout fabricated when a template has no
    /// usable layouts
    pub synthesized: bool,
}

impl LayoutDescriptor {
    /// First title placeholder, if the layout has one.
    pub fn title_placeholder(&self) -> Option<&PlaceholderDescriptor> {
        self.placeholders
            .iter()
            .find(|ph| ph.kind == PlaceholderKind::Title)
    }

    /// Body placeholders in declaration order.
    pub fn body_placeholders(&self) -> impl Iterator<Item = &PlaceholderDescriptor> {
        self.placeholders
            .iter()
            .filter(|ph| ph.kind == PlaceholderKind::Body)
    }

    /// Number of placeholders of a given kind.
    pub fn count_kind(&self, kind: PlaceholderKind) -> usize {
        self.placeholders.iter().filter(|ph| ph.kind == kind).count()
    }

    /// Whether the layout has at least one placeholder of a given kind.
    pub fn has_kind(&self, kind: PlaceholderKind) -> bool {
        self.placeholders.iter().any(|ph| ph.kind == kind)
    }
}

/// The twelve color slots of a theme color scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorScheme {
    pub dk1: RGBColor,
    pub lt1: RGBColor,
    pub dk2: RGBColor,
    pub lt2: RGBColor,
    pub accent1: RGBColor,
    pub accent2: RGBColor,
    pub accent3: RGBColor,
    pub accent4: RGBColor,
    pub accent5: RGBColor,
    pub accent6: RGBColor,
    pub hlink: RGBColor,
    pub folhlink: RGBColor,
}

impl ColorScheme {
    /// Look up a scheme color by its theme slot token (e.g., "dk1",
    /// "accent3").
    pub fn by_token(&self, token: &str) -> Option<RGBColor> {
        match token {
            "dk1" => Some(self.dk1),
            "lt1" => Some(self.lt1),
            "dk2" => Some(self.dk2),
            "lt2" => Some(self.lt2),
            "accent1" => Some(self.accent1),
            "accent2" => Some(self.accent2),
            "accent3" => Some(self.accent3),
            "accent4" => Some(self.accent4),
            "accent5" => Some(self.accent5),
            "accent6" => Some(self.accent6),
            "hlink" => Some(self.hlink),
            "folHlink" => Some(self.folhlink),
            _ => None,
        }
    }
}

impl Default for ColorScheme {
    /// Office-style fallback palette for templates without a readable theme.
    fn default() -> Self {
        Self {
            dk1: RGBColor::BLACK,
            lt1: RGBColor::WHITE,
            dk2: RGBColor::new(0x44, 0x54, 0x6A),
            lt2: RGBColor::new(0xE7, 0xE6, 0xE6),
            accent1: RGBColor::new(0x44, 0x72, 0xC4),
            accent2: RGBColor::new(0xED, 0x7D, 0x31),
            accent3: RGBColor::new(0xA5, 0xA5, 0xA5),
            accent4: RGBColor::new(0xFF, 0xC0, 0x00),
            accent5: RGBColor::new(0x5B, 0x9B, 0xD5),
            accent6: RGBColor::new(0x70, 0xAD, 0x47),
            hlink: RGBColor::new(0x05, 0x63, 0xC1),
            folhlink: RGBColor::new(0x95, 0x4F, 0x72),
        }
    }
}

/// Theme information: palette plus major and minor latin fonts.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ColorScheme,
    /// Heading font typeface
    pub major_font: String,
    /// Body font typeface
    pub minor_font: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: String::new(),
            colors: ColorScheme::default(),
            major_font: "Calibri".to_string(),
            minor_font: "Calibri".to_string(),
        }
    }
}

/// The master's color map, translating slide color tokens to theme slots.
///
/// `<p:clrMap bg1="lt1" tx1="dk1" .../>` lets a master swap light and dark
/// roles without touching the theme.
#[derive(Debug, Clone)]
pub struct ClrMap {
    pub bg1: String,
    pub tx1: String,
    pub bg2: String,
    pub tx2: String,
}

impl ClrMap {
    /// Translate a slide color token to its theme slot token.
    ///
    /// Tokens outside the four mapped slots (accents, hlink) pass through
    /// unchanged.
    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        match token {
            "bg1" => &self.bg1,
            "tx1" => &self.tx1,
            "bg2" => &self.bg2,
            "tx2" => &self.tx2,
            other => other,
        }
    }
}

impl Default for ClrMap {
    fn default() -> Self {
        Self {
            bg1: "lt1".to_string(),
            tx1: "dk1".to_string(),
            bg2: "lt2".to_string(),
            tx2: "dk2".to_string(),
        }
    }
}

/// Default run properties per placeholder role, from the master's
/// `<p:txStyles>`.
#[derive(Debug, Clone)]
pub struct MasterStyles {
    pub title: TextStyle,
    pub body: TextStyle,
    pub other: TextStyle,
}

impl Default for MasterStyles {
    /// Conservative defaults for masters without text styles: a bold 32pt
    /// dark-blue title over an 18pt body.
    fn default() -> Self {
        Self {
            title: TextStyle {
                size_centipt: Some(3200),
                bold: Some(true),
                typeface: None,
                color: Some(RGBColor::new(0x1F, 0x4E, 0x79)),
            },
            body: TextStyle {
                size_centipt: Some(1800),
                bold: Some(false),
                typeface: None,
                color: None,
            },
            other: TextStyle::default(),
        }
    }
}

impl MasterStyles {
    /// The style tier for a placeholder role.
    pub fn for_kind(&self, kind: PlaceholderKind) -> &TextStyle {
        match kind {
            PlaceholderKind::Title => &self.title,
            PlaceholderKind::Body => &self.body,
            _ => &self.other,
        }
    }
}

/// An image placed on one of the template's slides.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub partname: PackURI,
    pub content_type: String,
    pub byte_size: usize,
    /// Zero-based index of the slide the picture shape sits on
    pub source_slide: usize,
    /// The picture shape's frame on its source slide, in EMU
    pub frame: Option<Rect>,
    /// Pixel dimensions when the format header could be read
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

impl ImageAsset {
    /// Width over height, from pixel dimensions when the header was
    /// readable, else from the source-slide frame.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width_px, self.height_px) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as f64 / h as f64),
            _ => self
                .frame
                .filter(|f| f.cy > 0)
                .map(|f| f.cx as f64 / f.cy as f64),
        }
    }
}

/// Analysis result for a template container.
#[derive(Debug, Clone)]
pub struct TemplateModel {
    /// Slide width in EMU
    pub slide_width: i64,
    /// Slide height in EMU
    pub slide_height: i64,
    pub theme: Theme,
    pub clr_map: ClrMap,
    pub master_styles: MasterStyles,
    /// Partname of the first slide master
    pub master_partname: PackURI,
    /// Layouts of the first slide master, in master list order
    pub layouts: Vec<LayoutDescriptor>,
    /// Reusable images, in source-slide order
    pub images: Vec<ImageAsset>,
    /// Notes master partname when the template carries one
    pub notes_master: Option<PackURI>,
    /// Number of slides already present in the template
    pub slide_count: usize,
}

impl TemplateModel {
    /// Resolve a slide color token (e.g., "tx1") through the color map
    /// into a concrete color.
    pub fn map_color(&self, token: &str) -> Option<RGBColor> {
        self.theme.colors.by_token(self.clr_map.resolve(token))
    }

    /// The background color slides inherit from the master.
    pub fn background_color(&self) -> RGBColor {
        self.map_color("bg1").unwrap_or(RGBColor::WHITE)
    }

    /// The default text color slides inherit from the master.
    pub fn text_color(&self) -> RGBColor {
        self.map_color("tx1").unwrap_or(RGBColor::BLACK)
    }

    /// Resolve a placeholder's effective text formatting.
    ///
    /// Each property independently takes the nearest non-empty override:
    /// the placeholder's own style, then the master's per-role text style,
    /// then the theme default. The ordered lookup is the whole of the
    /// inheritance model; there is no other resolution path.
    pub fn resolve_style(&self, ph: &PlaceholderDescriptor) -> ResolvedStyle {
        let tier = self.master_styles.for_kind(ph.kind);
        let is_title = ph.kind == PlaceholderKind::Title;

        let typeface = ph
            .style
            .typeface
            .clone()
            .or_else(|| tier.typeface.clone())
            .unwrap_or_else(|| {
                if is_title {
                    self.theme.major_font.clone()
                } else {
                    self.theme.minor_font.clone()
                }
            });
        let size_centipt = ph
            .style
            .size_centipt
            .or(tier.size_centipt)
            .unwrap_or(if is_title { 3200 } else { 1800 });
        let bold = ph.style.bold.or(tier.bold).unwrap_or(is_title);
        let color = ph.style.color.or(tier.color).unwrap_or_else(|| self.text_color());

        ResolvedStyle {
            typeface,
            size_centipt,
            bold,
            color,
        }
    }

    /// Condensed description of the analysis, suitable for serialization.
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            slide_width: self.slide_width,
            slide_height: self.slide_height,
            theme_name: self.theme.name.clone(),
            major_font: self.theme.major_font.clone(),
            minor_font: self.theme.minor_font.clone(),
            layout_count: self.layouts.len(),
            placeholder_count: self.layouts.iter().map(|l| l.placeholders.len()).sum(),
            image_count: self.images.len(),
            slide_count: self.slide_count,
        }
    }
}

/// Flat, serializable summary of a [`TemplateModel`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub slide_width: i64,
    pub slide_height: i64,
    pub theme_name: String,
    pub major_font: String,
    pub minor_font: String,
    pub layout_count: usize,
    pub placeholder_count: usize,
    pub image_count: usize,
    pub slide_count: usize,
}
