//! Builds the natural-language instruction sent to image providers.

use crate::models::GenerationRequest;

const DEFAULT_STYLE: &str = "Modern, clean and professional presentation design";
const DEFAULT_COLORS: &str = "Harmonious palette chosen to suit the content";
const DEFAULT_REQUIREMENTS: &str =
    "Leave generous empty space for slide text; no text, logos or watermarks in the image";
const DEFAULT_CONTENT: &str = "A general-purpose presentation slide";

/// Section headings differ per provider: some models follow English prompts
/// best, others respond better to Chinese headers with English glosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    English,
    Bilingual,
}

struct Labels {
    intro: &'static str,
    style: &'static str,
    colors: &'static str,
    requirements: &'static str,
    content: &'static str,
    reference: &'static str,
    slide_image: &'static str,
    closing: &'static str,
}

const ENGLISH: Labels = Labels {
    intro: "Create a background image for a presentation slide.",
    style: "Style",
    colors: "Color scheme",
    requirements: "Design requirements",
    content: "Slide content",
    reference: "A reference image is attached. Match its visual style, mood and composition.",
    slide_image: "An image of the current slide is attached. Design the background so it fits that layout.",
    closing: "Output a single high-resolution, polished background image suitable for a professional presentation.",
};

const BILINGUAL: Labels = Labels {
    intro: "为演示文稿幻灯片生成一张背景图 / Create a background image for a presentation slide.",
    style: "【风格 Style】",
    colors: "【配色 Color scheme】",
    requirements: "【设计要求 Design requirements】",
    content: "【页面内容 Slide content】",
    reference: "【参考图 Reference】已附参考图，请参考其视觉风格、氛围与构图 / Match the attached reference image's style, mood and composition.",
    slide_image: "【页面截图 Slide image】已附当前页面截图，背景需适配该版式 / Fit the background to the attached slide layout.",
    closing: "【输出 Output】高分辨率、精致的专业演示背景图，不含文字 / One high-resolution, polished, text-free professional background.",
};

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

fn has_image(image: &Option<String>) -> bool {
    image.as_deref().map_or(false, |data| !data.trim().is_empty())
}

/// Assembles the prompt. Empty fields are replaced by fixed defaults so every
/// section is always present.
pub fn compose(request: &GenerationRequest, style: PromptStyle) -> String {
    let labels = match style {
        PromptStyle::English => &ENGLISH,
        PromptStyle::Bilingual => &BILINGUAL,
    };
    let separator = match style {
        PromptStyle::English => ": ",
        PromptStyle::Bilingual => " ",
    };

    let mut sections = vec![
        labels.intro.to_string(),
        format!(
            "{}{}{}",
            labels.style,
            separator,
            or_default(&request.style_description, DEFAULT_STYLE)
        ),
        format!(
            "{}{}{}",
            labels.colors,
            separator,
            or_default(&request.color_scheme, DEFAULT_COLORS)
        ),
        format!(
            "{}{}{}",
            labels.requirements,
            separator,
            or_default(&request.design_requirements, DEFAULT_REQUIREMENTS)
        ),
        format!(
            "{}{}{}",
            labels.content,
            separator,
            or_default(&request.slide_content, DEFAULT_CONTENT)
        ),
    ];

    if has_image(&request.reference_image) {
        sections.push(labels.reference.to_string());
    }
    if has_image(&request.slide_image) {
        sections.push(labels.slide_image.to_string());
    }
    sections.push(labels.closing.to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_empty_fields() {
        let prompt = compose(&GenerationRequest::default(), PromptStyle::English);
        assert!(prompt.contains(&format!("Style: {}", DEFAULT_STYLE)));
        assert!(prompt.contains(&format!("Color scheme: {}", DEFAULT_COLORS)));
        assert!(prompt.contains(&format!("Design requirements: {}", DEFAULT_REQUIREMENTS)));
        assert!(prompt.contains(&format!("Slide content: {}", DEFAULT_CONTENT)));
        assert!(!prompt.contains("reference image is attached"));
    }

    #[test]
    fn test_section_order() {
        let request = GenerationRequest::new("Quarterly revenue")
            .with_style("Watercolor")
            .with_color_scheme("Teal and sand")
            .with_requirements("Soft gradients")
            .with_reference_image("aGVsbG8=")
            .with_slide_image("aGVsbG8=");
        let prompt = compose(&request, PromptStyle::English);

        let order = [
            "Watercolor",
            "Teal and sand",
            "Soft gradients",
            "Quarterly revenue",
            "reference image is attached",
            "image of the current slide",
            "high-resolution",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| prompt.find(needle).expect(needle))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_bilingual_headers() {
        let request = GenerationRequest::new("路线图").with_style("  ");
        let prompt = compose(&request, PromptStyle::Bilingual);
        assert!(prompt.contains("【风格 Style】 Modern"));
        assert!(prompt.contains("【页面内容 Slide content】 路线图"));
        assert!(prompt.ends_with(BILINGUAL.closing));
    }

    #[test]
    fn test_deterministic() {
        let request = GenerationRequest::new("Team").with_color_scheme("Navy");
        assert_eq!(
            compose(&request, PromptStyle::English),
            compose(&request, PromptStyle::English)
        );
    }
}
