//! Prompt construction and the random scene parameters behind it.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

const AGE_GROUPS: &[(&str, &str)] = &[
    ("22-28", "youthful energy, fresh face"),
    ("22-28", "youthful energy, fresh face"),
    ("22-28", "youthful energy, fresh face"),
    ("30-40", "confident, experienced look"),
    ("42-52", "wise, contemplative expression"),
    ("55-65", "weathered, philosophical demeanor"),
];

const VOICE_TEXTURES: &[&str] = &[
    "soft and breathy, intimate whisper-like",
    "deep and resonant, commanding presence",
    "gentle and warm, soothing tone",
    "raw and emotional, slightly cracked",
    "calm and measured, meditative pace",
];

const RECITAL_SETTINGS: &[&str] = &[
    "by a rain-streaked window with city lights behind",
    "in a dimly lit old library with books",
    "on a moonlit balcony with plants",
    "in a candlelit room with warm shadows",
    "by a foggy riverside at dawn",
    "in an artist's studio with paintings",
    "at a quiet cafe corner with steaming chai",
    "on a train, watching landscapes pass",
];

const RECITAL_CLOTHING: &[&str] = &[
    "simple white kurta",
    "dark nehru jacket over cream shirt",
    "casual linen shirt, slightly unbuttoned",
    "traditional shawl over kurta",
    "modern black t-shirt",
];

const AMBIENT_SETTINGS: &[&str] = &[
    "rooftop terrace at golden hour with city skyline",
    "rain-soaked street with neon reflections",
    "peaceful beach at sunset with waves",
    "traditional haveli courtyard with diyas",
    "misty hill station with pine trees",
    "bustling old city lane at dusk",
    "serene lake with mountains behind",
    "flower-filled garden in soft morning light",
    "vintage cafe with large windows",
    "temple steps at evening aarti time",
];

const AMBIENT_APPEARANCES: &[&str] = &[
    "long flowing black hair, fair complexion, delicate features",
    "wavy brown hair, dusky skin tone, expressive eyes",
    "short stylish hair, wheatish complexion, strong jawline",
    "braided hair with flowers, medium skin tone, soft features",
    "curly voluminous hair, olive complexion, prominent cheekbones",
];

const AMBIENT_OUTFITS: &[&str] = &[
    "vibrant red saree with gold border",
    "pastel blue lehenga with silver work",
    "white cotton saree with minimal jewelry",
    "modern fusion outfit, crop top and palazzo",
    "elegant black dress with traditional earrings",
    "yellow anarkali with floral print",
    "maroon silk kurta with churidar",
    "emerald green saree with temple jewelry",
];

const CUT_STYLES: &[(&str, &str)] = &[
    ("single", "One continuous shot with subtle camera movement"),
    ("two-cut", "[0-4s] Wide establishing shot, [4-8s] Close-up emotional shot"),
    ("three-cut", "[0-3s] Wide shot, [3-5s] Medium shot, [5-8s] Close-up"),
    ("dynamic", "[0-2s] Detail shot, [2-5s] Medium shot with movement, [5-8s] Wide pullback"),
];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecitalCharacter {
    pub age_range: String,
    pub age_desc: String,
    pub voice_texture: String,
    pub setting: String,
    pub clothing: String,
}

impl RecitalCharacter {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (age_range, age_desc) = AGE_GROUPS.choose(rng).copied().unwrap_or(AGE_GROUPS[0]);
        Self {
            age_range: age_range.to_string(),
            age_desc: age_desc.to_string(),
            voice_texture: pick(rng, VOICE_TEXTURES).to_string(),
            setting: pick(rng, RECITAL_SETTINGS).to_string(),
            clothing: pick(rng, RECITAL_CLOTHING).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbientScene {
    pub setting: String,
    pub appearance: String,
    pub outfit: String,
    pub cut_style: String,
    pub cut_desc: String,
}

impl AmbientScene {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (cut_style, cut_desc) = CUT_STYLES.choose(rng).copied().unwrap_or(CUT_STYLES[0]);
        Self {
            setting: pick(rng, AMBIENT_SETTINGS).to_string(),
            appearance: pick(rng, AMBIENT_APPEARANCES).to_string(),
            outfit: pick(rng, AMBIENT_OUTFITS).to_string(),
            cut_style: cut_style.to_string(),
            cut_desc: cut_desc.to_string(),
        }
    }
}

/// Commas and exclamations become trailing pauses so the voice slows down.
pub fn prose_for_speech(text: &str) -> String {
    let mut prose = text.replace([',', '!'], "…");
    if !prose.ends_with('।') && !prose.ends_with('…') {
        prose.push('…');
    }
    prose
}

/// Ask the text model for the spoken timeline of an 8 second recital.
pub fn recital_timeline_request(text: &str) -> String {
    format!(
        r#"Generate ONLY the timeline portion for a video generation prompt.

This is SPOKEN shayari, NOT sung. Flat monotone voice like reading aloud.

TEXT TO SPEAK (exact words, do not change):
"{prose}"

Generate timeline entries from [0:00.5] to [0:07.5].
Split the text naturally with meaningful pauses between phrases.

FORMAT (follow exactly):
[0:00.5–0:XX.X] speaks flatly: "first phrase here…" monotone, no melody
[0:XX.X–0:XX.X] pause, slight breath
[0:XX.X–0:XX.X] speaks flatly: "next phrase…" same flat tone

RULES:
- Speech pace about 2 words per second
- Include 3-4 pauses of 0.4-0.6s
- Final timestamp must end at exactly 0:07.5
- Use the exact Hindi text provided

Return ONLY the timeline lines, nothing else."#,
        prose = prose_for_speech(text)
    )
}

/// Final Veo prompt for the recital clip around a generated timeline.
pub fn recital_video_prompt(character: &RecitalCharacter, timeline: &str, seconds: u32) -> String {
    format!(
        r#"SPOKEN WORD ONLY. ABSOLUTELY NO SINGING.

A single Indian man speaks a Hindi shayari in a flat, monotone voice.

CHARACTER: {age_range} years old, {age_desc}, wearing {clothing}, {setting}
VOICE DELIVERY: {voice}

- Spoken like a late-night confession to a friend
- No melody, no humming, no stretched words
- Emotion through pauses and the eyes only
- No text or subtitles in the video

[0:00–0:00.5] small breath, eyes settle, prepares to speak
{timeline}
[0:07.5–0:08.0] soft exhale, gaze drops slightly

Visual consistency unchanged: clothing, hair, lighting, background.
Duration: {seconds} seconds."#,
        age_range = character.age_range,
        age_desc = character.age_desc,
        clothing = character.clothing,
        setting = character.setting,
        voice = character.voice_texture,
        timeline = strip_code_fence(timeline),
        seconds = seconds,
    )
}

/// Ask the text model for a mood-matched ambient scene prompt.
pub fn ambient_prompt_request(text: &str, scene: &AmbientScene, seconds: u32, aspect: &str) -> String {
    format!(
        r#"Create a cinematic video prompt featuring a beautiful Indian woman.

SHAYARI:
"{text}"

MANDATORY PARAMETERS (use these exactly):
- Setting: {setting}
- Appearance: {appearance}
- Outfit: {outfit}
- Cut style: {cut_style}: {cut_desc}

Match her actions to the mood of the shayari: romantic, melancholic,
nostalgic, festive or longing. Natural graceful movement, cinematic
lighting and colour grading.

IMPORTANT:
- NO speaking or lip movement
- Same woman and outfit throughout
- No text in the video

Return ONLY the prompt, ending with: {seconds} seconds, {aspect} vertical, cinematic. No dialogue, no audio."#,
        text = text,
        setting = scene.setting,
        appearance = scene.appearance,
        outfit = scene.outfit,
        cut_style = scene.cut_style,
        cut_desc = scene.cut_desc,
        seconds = seconds,
        aspect = aspect,
    )
}

pub const TRANSCRIPTION_PROMPT: &str = r#"Listen to this Hindi audio carefully and provide word-by-word timestamps.

Return ONLY a valid JSON array with this exact format:
[
  {"word": "किसी", "start": 0.94},
  {"word": "की", "start": 1.33}
]

RULES:
1. Include every word spoken
2. Start time in seconds (decimal)
3. Preserve punctuation attached to words
4. Return ONLY the JSON array, no explanation"#;

/// Remove a surrounding markdown code fence and stray wrapping quotes.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        body = body.trim_end();
        body = body.strip_suffix("```").unwrap_or(body);
    }
    let body = body.trim();
    body.strip_prefix('"')
        .and_then(|b| b.strip_suffix('"'))
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn seeded_parameters_are_reproducible() {
        let a = RecitalCharacter::random(&mut StdRng::seed_from_u64(3));
        let b = RecitalCharacter::random(&mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        let scene = AmbientScene::random(&mut StdRng::seed_from_u64(3));
        assert!(AMBIENT_SETTINGS.contains(&scene.setting.as_str()));
    }

    #[test]
    fn prose_adds_pauses() {
        assert_eq!(prose_for_speech("दिल, धड़कन!"), "दिल… धड़कन…");
        assert_eq!(prose_for_speech("ख़त्म।"), "ख़त्म।");
    }

    #[test]
    fn code_fences_and_quotes_are_stripped() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n[0:00.5] speaks\n```"), "[0:00.5] speaks");
        assert_eq!(strip_code_fence("\"a scene\""), "a scene");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[test]
    fn recital_prompt_embeds_character_and_timeline() {
        let character = RecitalCharacter::random(&mut StdRng::seed_from_u64(1));
        let prompt = recital_video_prompt(&character, "```\n[0:00.5–0:02.0] speaks\n```", 8);
        assert!(prompt.contains(&character.clothing));
        assert!(prompt.contains("[0:00.5–0:02.0] speaks"));
        assert!(!prompt.contains("```"));
        assert!(prompt.contains("Duration: 8 seconds."));
    }

    #[test]
    fn ambient_request_carries_text_and_scene() {
        let scene = AmbientScene::random(&mut StdRng::seed_from_u64(9));
        let request = ambient_prompt_request("चाँद रात", &scene, 8, "9:16");
        assert!(request.contains("चाँद रात"));
        assert!(request.contains(&scene.outfit));
        assert!(request.contains("8 seconds, 9:16 vertical"));
    }
}
