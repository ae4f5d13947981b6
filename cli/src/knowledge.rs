//! Default debate topic and each side's talking points.

pub const DEFAULT_TOPIC: &str = "AI should be widely adopted in college education";

pub const PRO_KNOWLEDGE: &[&str] = &[
    "AI enables 24/7 personalized tutoring (Stanford 2023 study)",
    "Automated grading saves teachers 9hrs/week (Brookings Institute)",
    "Adaptive learning improves test scores by 22% (MIT Review)",
];

pub const CON_KNOWLEDGE: &[&str] = &[
    "AI cannot replicate human mentorship (UNESCO Report 2024)",
    "Algorithmic bias widens achievement gaps (Harvard Ed. Review)",
    "Over-reliance erases critical thinking skills (Neuroscience Journal)",
];

pub fn talking_points(points: &[&str]) -> Vec<String> {
    points.iter().map(|p| p.to_string()).collect()
}
