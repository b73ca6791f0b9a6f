// Dark report palette.
pub const BG: &str = "#12151b";
pub const SURFACE_0: &str = "#141820";
pub const SURFACE_1: &str = "#191e26";
pub const SURFACE_2: &str = "#1f252e";
pub const BORDER: &str = "#303a46";
pub const TEXT: &str = "#e6ecf4";
pub const TEXT_MUTED: &str = "#8491a0";
pub const PRIMARY: &str = "#3ac96f";
pub const DANGER: &str = "#e25c5c";
pub const SKIPPED: &str = "#7a8696";

pub fn stylesheet() -> String {
    format!(
        "body {{ background: {BG}; color: {TEXT}; font-family: -apple-system, 'Segoe UI', sans-serif; margin: 0; }}
header {{ background: {SURFACE_1}; border-bottom: 1px solid {BORDER}; padding: 16px 24px; }}
h1 {{ font-size: 20px; margin: 0 0 4px 0; }}
h2 {{ font-size: 15px; margin: 0; flex: 1; }}
main {{ padding: 16px 24px; }}
.muted {{ color: {TEXT_MUTED}; font-size: 12px; }}
.cards {{ display: flex; gap: 12px; margin-bottom: 16px; }}
.card {{ background: {SURFACE_1}; border: 1px solid {BORDER}; border-radius: 8px; padding: 12px 16px; min-width: 120px; }}
.card .value {{ font-size: 22px; font-weight: 600; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid {BORDER}; padding: 6px 8px; text-align: left; font-size: 13px; vertical-align: top; }}
th {{ background: {SURFACE_2}; }}
.info {{ margin-bottom: 16px; max-width: 640px; }}
.test {{ background: {SURFACE_0}; border: 1px solid {BORDER}; border-radius: 8px; padding: 12px 16px; margin-bottom: 10px; }}
.test-head {{ display: flex; align-items: center; gap: 12px; }}
.label {{ border-radius: 4px; padding: 2px 8px; font-size: 12px; font-weight: 700; color: {BG}; }}
.label.pass {{ background: {PRIMARY}; }}
.label.fail {{ background: {DANGER}; }}
.label.skip {{ background: {SKIPPED}; }}
.steps {{ margin: 8px 0; padding-left: 20px; font-size: 13px; color: {TEXT_MUTED}; }}
details summary {{ cursor: pointer; color: {DANGER}; font-weight: 600; }}
pre {{ background: {SURFACE_1}; padding: 8px; border-radius: 6px; white-space: pre-wrap; word-break: break-all; }}
"
    )
}
