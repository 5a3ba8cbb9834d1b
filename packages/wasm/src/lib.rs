use serde::de::value::StrDeserializer;
use serde::de::{self, IntoDeserializer};
use serde::{Deserialize, Serialize};
use sop_editor::{
    Draft, DraftError, DraftKey, DraftStore, EditSession, EditorConfig, HeightTable, HistoryMode,
    ManualClock, MemoryDraftStore, Mutation, Point, RowRect,
};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Draft storage shared between the session and the host, which mirrors
/// entries into `localStorage`.
#[derive(Debug, Clone, Default)]
struct SharedDraftStore(Rc<RefCell<MemoryDraftStore>>);

impl DraftStore for SharedDraftStore {
    fn read(&self, key: &DraftKey) -> Result<Option<Draft>, DraftError> {
        self.0.borrow().read(key)
    }

    fn write(&mut self, key: &DraftKey, draft: &Draft) -> Result<(), DraftError> {
        self.0.borrow_mut().write(key, draft)
    }

    fn remove(&mut self, key: &DraftKey) -> Result<(), DraftError> {
        self.0.borrow_mut().remove(key)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

/// History mode by its serialized name (`push`, `replace`, `untracked`)
fn parse_mode(mode: &str) -> Result<HistoryMode, String> {
    let deserializer: StrDeserializer<'_, de::value::Error> = mode.into_deserializer();
    HistoryMode::deserialize(deserializer).map_err(|e| format!("Invalid history mode: {}", e))
}

/// Editing session driven by the host page.
///
/// Time comes from the host (`setNow` before each event batch), so debounced
/// work fires on the host's `tick` calls.
#[wasm_bindgen]
pub struct Editor {
    session: EditSession,
    clock: ManualClock,
    drafts: SharedDraftStore,
}

impl Editor {
    fn create(
        config_json: Option<&str>,
        now: f64,
        unsaved_draft: Option<&str>,
    ) -> Result<Editor, String> {
        let config: EditorConfig = match config_json {
            Some(json) => serde_json::from_str(json).map_err(|e| format!("Invalid config: {}", e))?,
            None => EditorConfig::default(),
        };
        let clock = ManualClock::new(now as i64);
        let mut drafts = SharedDraftStore::default();

        if let Some(json) = unsaved_draft {
            let draft: Draft =
                serde_json::from_str(json).map_err(|e| format!("Invalid draft: {}", e))?;
            drafts
                .write(&DraftKey::Unsaved, &draft)
                .map_err(|e| e.to_string())?;
        }

        let session = EditSession::new(config, Box::new(clock.clone()), Box::new(drafts.clone()));
        Ok(Editor {
            session,
            clock,
            drafts,
        })
    }

    fn apply_json(&mut self, mutation_json: &str, mode: &str) -> Result<bool, String> {
        let mutation: Mutation =
            serde_json::from_str(mutation_json).map_err(|e| format!("Invalid mutation: {}", e))?;
        let mode = parse_mode(mode)?;
        self.session
            .apply(mutation, mode)
            .map(|outcome| outcome.changed)
            .map_err(|e| e.to_string())
    }

    fn pointer_move_json(&mut self, x: f64, y: f64, rects_json: &str) -> Result<String, String> {
        let rects: Vec<RowRect> =
            serde_json::from_str(rects_json).map_err(|e| format!("Invalid row rects: {}", e))?;
        to_json(&self.session.pointer_move(Point::new(x, y), &rects))
    }

    fn pointer_up_json(&mut self) -> Result<String, String> {
        let kind = self.session.pointer_up().map_err(|e| e.to_string())?;
        to_json(&kind)
    }

    fn animation_frame_json(&mut self, heights_json: &str) -> Result<String, String> {
        let heights: HeightTable =
            serde_json::from_str(heights_json).map_err(|e| format!("Invalid heights: {}", e))?;
        let steps = self
            .session
            .on_animation_frame(&heights)
            .map_err(|e| e.to_string())?;
        to_json(&steps)
    }

    fn draft_json(&self, document_id: Option<String>) -> Result<Option<String>, String> {
        let key = DraftKey::for_document(document_id.as_deref());
        let draft = self.drafts.read(&key).map_err(|e| e.to_string())?;
        draft.map(|d| to_json(&d)).transpose()
    }
}

#[wasm_bindgen]
impl Editor {
    /// `configJson` and `unsavedDraftJson` are optional; pass `undefined` to skip
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        now: f64,
        unsaved_draft_json: Option<String>,
    ) -> Result<Editor, JsValue> {
        Self::create(config_json.as_deref(), now, unsaved_draft_json.as_deref())
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = setNow)]
    pub fn set_now(&self, now: f64) {
        self.clock.set(now as i64);
    }

    #[wasm_bindgen(js_name = stateJson)]
    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.session.state()).map_err(|e| JsValue::from_str(&e))
    }

    /// Apply a `{"kind": ...}` mutation with mode `push`, `replace` or `untracked`
    #[wasm_bindgen(js_name = applyMutation)]
    pub fn apply_mutation(&mut self, mutation_json: &str, mode: &str) -> Result<bool, JsValue> {
        self.apply_json(mutation_json, mode)
            .map_err(|e| JsValue::from_str(&e))
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, block_id: &str, x: f64, y: f64) -> Result<String, JsValue> {
        to_json(&self.session.pointer_down(block_id, Point::new(x, y)))
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64, rects_json: &str) -> Result<String, JsValue> {
        self.pointer_move_json(x, y, rects_json)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Returns the reflow kind as JSON, or `null` when nothing moved
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self) -> Result<String, JsValue> {
        self.pointer_up_json().map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = cancelDrag)]
    pub fn cancel_drag(&mut self) {
        self.session.cancel_drag();
    }

    #[wasm_bindgen(js_name = beginColumnResize)]
    pub fn begin_column_resize(
        &mut self,
        row_id: &str,
        x: f64,
        row_width: f64,
    ) -> Result<(), JsValue> {
        self.session
            .begin_column_resize(row_id, x, row_width)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = updateColumnResize)]
    pub fn update_column_resize(&mut self, x: f64) -> Result<Option<f64>, JsValue> {
        self.session
            .update_column_resize(x)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = endColumnResize)]
    pub fn end_column_resize(&mut self, x: Option<f64>) -> Result<Option<f64>, JsValue> {
        self.session
            .end_column_resize(x)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = startEqualize)]
    pub fn start_equalize(&mut self, row_id: &str) -> Result<bool, JsValue> {
        self.session
            .start_equalize(row_id)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Feed one animation frame with the column heights measured this frame
    #[wasm_bindgen(js_name = animationFrame)]
    pub fn animation_frame(&mut self, heights_json: &str) -> Result<String, JsValue> {
        self.animation_frame_json(heights_json)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = observeRowHeight)]
    pub fn observe_row_height(&mut self, row_id: &str, height: f64) -> bool {
        self.session.observe_row_height(row_id, height)
    }

    #[wasm_bindgen(js_name = observeFooterHeight)]
    pub fn observe_footer_height(&mut self, variant: &str, height: f64) -> bool {
        self.session.observe_footer_height(variant, height)
    }

    /// Run due debounced work at `now`; returns `{draftSaved, layoutUpdated}`
    pub fn tick(&mut self, now: f64) -> Result<String, JsValue> {
        self.clock.set(now as i64);
        to_json(&self.session.tick()).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = flushDraft)]
    pub fn flush_draft(&mut self) -> bool {
        self.session.flush_draft()
    }

    /// Stored draft for a document id (`undefined` for the unsaved document)
    #[wasm_bindgen(js_name = draftJson)]
    pub fn draft(&self, document_id: Option<String>) -> Result<Option<String>, JsValue> {
        self.draft_json(document_id)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = pageBreaks)]
    pub fn page_breaks(&self) -> Result<String, JsValue> {
        to_json(&self.session.page_breaks()).map_err(|e| JsValue::from_str(&e))
    }

    /// Settled page layout for print/PDF export
    #[wasm_bindgen(js_name = exportPages)]
    pub fn export_pages(&mut self) -> Result<String, JsValue> {
        to_json(self.session.export_pages()).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        self.session
            .export_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&mut self, input: &str) -> Result<(), JsValue> {
        self.session
            .import_json(input)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Discard the document and start from the template
    pub fn reset(&mut self) {
        self.session.reset();
    }

    #[wasm_bindgen(js_name = statusJson)]
    pub fn status_json(&self) -> Result<Option<String>, JsValue> {
        self.session
            .status()
            .map(to_json)
            .transpose()
            .map_err(|e| JsValue::from_str(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sop_editor::DocumentState;

    fn editor() -> Editor {
        Editor::create(None, 0.0, None).unwrap()
    }

    #[test]
    fn test_apply_mutation_json_and_undo() {
        let mut editor = editor();
        let changed = editor
            .apply_json(r#"{"kind": "addBlock", "blockType": "text"}"#, "push")
            .unwrap();
        assert!(changed);
        assert_eq!(editor.session.state().rows.len(), 3);

        assert!(editor.undo());
        assert_eq!(editor.session.state(), &DocumentState::initial());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut editor = editor();
        let err = editor
            .apply_json(r#"{"kind": "sortContentBoxes"}"#, "sideways")
            .unwrap_err();
        assert!(err.contains("sideways"));
    }

    #[test]
    fn test_modes_parse_by_serialized_name() {
        assert_eq!(parse_mode("push").unwrap(), HistoryMode::Push);
        assert_eq!(parse_mode("replace").unwrap(), HistoryMode::Replace);
        assert_eq!(parse_mode("untracked").unwrap(), HistoryMode::Untracked);
        let serialized = serde_json::to_value(HistoryMode::Replace).unwrap();
        assert_eq!(
            parse_mode(serialized.as_str().unwrap()).unwrap(),
            HistoryMode::Replace
        );
        assert!(parse_mode("Push").is_err());
    }

    #[test]
    fn test_draft_written_after_quiet_period() {
        let mut editor = editor();
        editor
            .apply_json(r#"{"kind": "addBlock", "blockType": "image"}"#, "push")
            .unwrap();
        assert_eq!(editor.draft_json(None).unwrap(), None);

        editor.clock.set(5_000);
        editor.session.tick();

        let draft = editor.draft_json(None).unwrap().unwrap();
        assert!(draft.contains("\"savedAt\":5000"));
    }

    #[test]
    fn test_unsaved_draft_is_recovered() {
        let mut first = editor();
        first
            .apply_json(r#"{"kind": "addBlock", "blockType": "text"}"#, "push")
            .unwrap();
        first.session.flush_draft();
        let draft = first.draft_json(None).unwrap().unwrap();

        let second = Editor::create(None, 10.0, Some(&draft)).unwrap();
        assert_eq!(second.session.state(), first.session.state());
    }

    #[test]
    fn test_drag_over_json_rects() {
        let mut editor = editor();
        editor
            .apply_json(r#"{"kind": "addBlock", "blockType": "text"}"#, "push")
            .unwrap();
        let text_id = editor.session.state().rows[2].blocks[0].id.clone();
        let rects = r#"[
            {"rowId": "row-title", "top": 0, "bottom": 100, "left": 0, "right": 600, "blockCount": 1},
            {"rowId": "row-definition", "top": 100, "bottom": 200, "left": 0, "right": 600, "blockCount": 1}
        ]"#;

        editor.session.pointer_down(&text_id, Point::new(0.0, 250.0));
        editor.pointer_move_json(450.0, 150.0, rects).unwrap();
        let kind = editor.pointer_up_json().unwrap();

        assert_eq!(kind, "\"merged\"");
        assert_eq!(editor.session.state().rows.len(), 2);
    }
}
