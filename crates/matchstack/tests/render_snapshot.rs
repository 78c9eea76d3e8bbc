use insta::assert_snapshot;
use matchstack::app::locate::NodeLocator;
use matchstack::app::render::{ContextRenderer, RenderOptions};
use matchstack::domain::model::AnnotatedText;

const DECOMPILED: &str = r#"(song_select_panel /* ID: 0 */
   (focus /* ID: 1 */ play_button)
   (enter
      {
         /* ID: 41 */
         if
         {== $mode 1}
         {print "ready"} /* ID: 42 */
      }
   )
)"#;

#[test]
fn plain_context_window_renders() {
    let text = AnnotatedText::from_text(DECOMPILED);
    let found = NodeLocator::default().locate(&text, 42).expect("node 42");

    let mut out = Vec::new();
    ContextRenderer::new()
        .render(
            &mut out,
            "song_select.dta",
            &text,
            &found,
            42,
            &RenderOptions::default(),
        )
        .expect("render");

    let rendered = String::from_utf8(out).expect("utf8 output");
    assert_snapshot!("plain_context_window", rendered);
}
