use crate::*;

fn rule(name: &str) -> &'static FixRule {
    repair_rules()
        .iter()
        .find(|rule| rule.name() == name)
        .expect("registered rule")
}

fn doc_with(cells: &str) -> String {
    format!(
        "<mxfile host=\"app.diagrams.net\">\n  <diagram id=\"d1\" name=\"Page-1\">\n    <mxGraphModel>\n      <root>\n        <mxCell id=\"0\" />\n        <mxCell id=\"1\" parent=\"0\" />\n        {cells}\n      </root>\n    </mxGraphModel>\n  </diagram>\n</mxfile>"
    )
}

#[test]
fn registry_lists_every_rule_once() {
    let names: Vec<&str> = repair_rules().iter().map(|r| r.name()).collect();
    assert_eq!(names.len(), 22);
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    assert!(repair_rules().iter().all(|r| !r.description().is_empty()));
}

#[test]
fn quote_artifacts_lose_their_backslashes() {
    let fixed = rule("unescape-quote-artifacts")
        .apply(r#"<mxCell id=\"a\" />"#)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell id="a" />"#);
    assert!(rule("unescape-quote-artifacts").apply(r#"<mxCell id="a" />"#).is_none());
}

#[test]
fn code_fences_are_stripped() {
    let fenced = "```xml\n<mxfile host=\"x\"></mxfile>\n```";
    assert_eq!(
        rule("strip-code-fence").apply(fenced).unwrap(),
        "<mxfile host=\"x\"></mxfile>"
    );
    assert!(rule("strip-code-fence").apply("<mxfile></mxfile>").is_none());
}

#[test]
fn leading_prose_is_dropped_but_xml_declarations_stay() {
    let noisy = "Here is the diagram you asked for:\n<mxfile host=\"x\"></mxfile>";
    assert_eq!(
        rule("drop-leading-prose").apply(noisy).unwrap(),
        "<mxfile host=\"x\"></mxfile>"
    );
    let declared = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<mxfile host=\"x\"></mxfile>";
    assert!(rule("drop-leading-prose").apply(declared).is_none());
}

#[test]
fn duplicate_structural_attributes_are_removed() {
    let fixed = rule("dedup-structural-attrs")
        .apply(r#"<mxCell id="x" parent="1" parent="2" vertex="1" />"#)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell id="x" parent="1" vertex="1" />"#);
}

#[test]
fn bare_ampersands_are_escaped_but_entities_survive() {
    let fixed = rule("escape-bare-ampersands")
        .apply(r#"<mxCell value="R&D, AT&T" />"#)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell value="R&amp;D, AT&amp;T" />"#);
    assert!(
        rule("escape-bare-ampersands")
            .apply(r#"<mxCell value="a &amp; b &#65; &lt;" />"#)
            .is_none()
    );
}

#[test]
fn double_escaped_entities_unmangle_one_level() {
    let fixed = rule("unmangle-double-escapes")
        .apply(r#"value="&amp;lt;b&amp;gt;hi&amp;lt;/b&amp;gt;""#)
        .unwrap();
    assert_eq!(fixed, r#"value="&lt;b&gt;hi&lt;/b&gt;""#);
}

#[test]
fn bare_attribute_values_gain_quotes() {
    let fixed = rule("quote-bare-attr-values")
        .apply("<mxCell id=a7 vertex=1/>")
        .unwrap();
    assert_eq!(fixed, r#"<mxCell id="a7" vertex="1"/>"#);
    assert!(rule("quote-bare-attr-values").apply(r#"<mxCell id="a7" />"#).is_none());
}

#[test]
fn malformed_self_closing_tags_are_repaired() {
    assert_eq!(
        rule("fix-self-closing-end-tags")
            .apply("<root></mxCell/></root>")
            .unwrap(),
        "<root></mxCell></root>"
    );
    assert_eq!(
        rule("fix-self-closing-end-tags")
            .apply("<mxCell id=\"a\" / >")
            .unwrap(),
        "<mxCell id=\"a\" />"
    );
}

#[test]
fn missing_spaces_between_attributes_are_inserted() {
    let fixed = rule("space-adjacent-attrs")
        .apply(r#"<mxCell id="a"parent="1" />"#)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell id="a" parent="1" />"#);
}

#[test]
fn quoted_colors_inside_style_values_are_unquoted() {
    let fixed = rule("unquote-style-colors")
        .apply(r##"<mxCell style="rounded=0;fillColor="#DAE8FC";html=1;" />"##)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell style="rounded=0;fillColor=#DAE8FC;html=1;" />"#);
}

#[test]
fn bare_angle_brackets_in_attribute_values_are_escaped() {
    let fixed = rule("escape-lt-in-attrs")
        .apply(r#"<mxCell value="a<b and c<d" />"#)
        .unwrap();
    assert_eq!(fixed, r#"<mxCell value="a&lt;b and c&lt;d" />"#);
}

#[test]
fn invalid_numeric_references_are_dropped() {
    let fixed = rule("drop-invalid-char-refs")
        .apply("keep &#65; drop &#xD800; and &#;")
        .unwrap();
    assert_eq!(fixed, "keep &#65; drop  and ");
    assert!(rule("drop-invalid-char-refs").apply("ok &#10; &#x41;").is_none());
}

#[test]
fn double_hyphens_inside_comments_collapse() {
    let fixed = rule("collapse-comment-hyphens")
        .apply("<!-- left -- right -->")
        .unwrap();
    assert_eq!(fixed, "<!-- left - right -->");
    assert!(rule("collapse-comment-hyphens").apply("<!-- fine -->").is_none());
}

#[test]
fn miscased_dialect_tags_are_recased() {
    let fixed = rule("normalize-tag-casing")
        .apply("<MXGRAPHMODEL><root><mxcell id=\"a\" /></root></MXGRAPHMODEL>")
        .unwrap();
    assert_eq!(fixed, "<mxGraphModel><root><mxCell id=\"a\" /></root></mxGraphModel>");
    assert!(rule("normalize-tag-casing").apply("<div><b>x</b></div>").is_none());
}

#[test]
fn tags_outside_the_vocabulary_are_stripped() {
    let fixed = rule("strip-foreign-tags")
        .apply("<div><mxCell id=\"a\" /><span /></div>")
        .unwrap();
    assert_eq!(fixed, "<mxCell id=\"a\" />");
    assert!(
        rule("strip-foreign-tags")
            .apply("<root><mxCell id=\"a\" /></root>")
            .is_none()
    );
}

#[test]
fn dangling_open_tags_are_closed_in_reverse_order() {
    let fixed = rule("close-open-tags")
        .apply("<mxGraphModel><root><mxCell id=\"0\" />")
        .unwrap();
    assert_eq!(fixed, "<mxGraphModel><root><mxCell id=\"0\" /></root></mxGraphModel>");
}

#[test]
fn excess_closing_tags_are_removed() {
    let fixed = rule("remove-excess-closing-tags")
        .apply("<root><mxCell id=\"a\" /></mxCell></root>")
        .unwrap();
    assert_eq!(fixed, "<root><mxCell id=\"a\" /></root>");
}

#[test]
fn prose_after_the_document_end_is_trimmed() {
    let fixed = rule("trim-trailing-content")
        .apply("<mxfile></mxfile>\nHope this helps!")
        .unwrap();
    assert_eq!(fixed, "<mxfile></mxfile>");
    assert!(rule("trim-trailing-content").apply("<mxfile></mxfile>\n").is_none());
}

#[test]
fn stuttered_cell_opens_collapse_to_one() {
    let fixed = rule("collapse-duplicate-cell-opens")
        .apply("<mxCell id=\"n1\" vertex=\"1\">\n<mxCell id=\"n1\" vertex=\"1\"><mxGeometry as=\"geometry\" /></mxCell>")
        .unwrap();
    assert_eq!(
        fixed,
        "<mxCell id=\"n1\" vertex=\"1\"><mxGeometry as=\"geometry\" /></mxCell>"
    );
    // different ids are container markup, not a stutter
    assert!(
        rule("collapse-duplicate-cell-opens")
            .apply("<mxCell id=\"a\"><mxCell id=\"b\"></mxCell></mxCell>")
            .is_none()
    );
}

#[test]
fn nested_cells_are_flattened_into_siblings() {
    let fixed = rule("flatten-nested-cells")
        .apply("<root><mxCell id=\"a\" vertex=\"1\"><mxCell id=\"b\" vertex=\"1\"></mxCell></mxCell></root>")
        .unwrap();
    assert_eq!(
        fixed,
        "<root><mxCell id=\"a\" vertex=\"1\"></mxCell><mxCell id=\"b\" vertex=\"1\"></mxCell></root>"
    );

    let fixed = rule("flatten-nested-cells")
        .apply("<root><mxCell id=\"a\" vertex=\"1\"><mxCell id=\"b\" vertex=\"1\" /></mxCell></root>")
        .unwrap();
    assert_eq!(
        fixed,
        "<root><mxCell id=\"a\" vertex=\"1\"></mxCell><mxCell id=\"b\" vertex=\"1\" /></root>"
    );
}

#[test]
fn duplicate_ids_get_numbered_suffixes() {
    let fixed = rule("rename-duplicate-ids")
        .apply("<mxCell id=\"x\" /><mxCell id=\"x\" /><mxCell id=\"x\" />")
        .unwrap();
    assert_eq!(fixed, "<mxCell id=\"x\" /><mxCell id=\"x-2\" /><mxCell id=\"x-3\" />");
    assert!(
        rule("rename-duplicate-ids")
            .apply("<mxCell id=\"x\" /><mxCell id=\"y\" />")
            .is_none()
    );
}

#[test]
fn empty_ids_are_synthesized() {
    let fixed = rule("synthesize-empty-ids")
        .apply("<mxCell id=\"\" /><object id=\"\" label=\"L\" />")
        .unwrap();
    assert_eq!(fixed, "<mxCell id=\"cell-1\" /><object id=\"cell-2\" label=\"L\" />");
}

#[test]
fn valid_documents_skip_the_pipeline() {
    let report = validate_and_fix(&empty_diagram());
    assert!(report.valid);
    assert!(report.violation.is_none());
    assert!(report.fixed_xml.is_none());
    assert!(report.applied_fixes.is_empty());
}

#[test]
fn duplicate_parent_attributes_repair_and_revalidate() {
    let xml = doc_with(
        "<mxCell id=\"box1\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\" parent=\"1\">\n          <mxGeometry x=\"40\" y=\"40\" width=\"120\" height=\"60\" as=\"geometry\" />\n        </mxCell>",
    );
    assert_eq!(
        validate_cell_structure(&xml).unwrap().code,
        ViolationCode::MalformedXml
    );

    let report = validate_and_fix(&xml);
    assert!(report.valid);
    assert_eq!(report.applied_fixes, ["removed duplicate structural attributes"]);
    let fixed = report.fixed_xml.expect("repaired candidate");
    assert!(validate_cell_structure(&fixed).is_none());
    assert_eq!(fixed.matches("parent=\"1\"").count(), 1);
}

#[test]
fn nested_cells_repair_end_to_end() {
    let xml = doc_with(concat!(
        "<mxCell id=\"outer\" style=\"group;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxCell id=\"inner\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"outer\">",
        "<mxGeometry x=\"0\" y=\"0\" width=\"80\" height=\"40\" as=\"geometry\" /></mxCell></mxCell>",
    ));
    assert_eq!(
        validate_cell_structure(&xml).unwrap().code,
        ViolationCode::NestedCell
    );

    let report = validate_and_fix(&xml);
    assert!(report.valid);
    assert_eq!(report.applied_fixes, ["flattened nested cell blocks"]);
}

#[test]
fn duplicate_ids_repair_end_to_end() {
    let xml = doc_with(concat!(
        "<mxCell id=\"n1\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\" />",
        "<mxCell id=\"n1\" style=\"ellipse;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\" />",
    ));
    assert_eq!(
        validate_cell_structure(&xml).unwrap().code,
        ViolationCode::DuplicateId
    );

    let report = validate_and_fix(&xml);
    assert!(report.valid);
    assert_eq!(report.applied_fixes, ["renamed duplicate cell ids"]);
    assert!(report.fixed_xml.unwrap().contains("id=\"n1-2\""));
}

#[test]
fn model_output_with_fence_and_bare_ampersand_repairs() {
    let xml = concat!(
        "```xml\n",
        "<mxGraphModel><root><mxCell id=\"0\" /><mxCell id=\"1\" parent=\"0\" />",
        "<mxCell id=\"b1\" value=\"R&D\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxGeometry x=\"40\" y=\"40\" width=\"120\" height=\"60\" as=\"geometry\" /></mxCell>\n",
        "```",
    );
    let report = validate_and_fix(xml);
    assert!(report.valid);
    assert_eq!(
        report.applied_fixes,
        [
            "stripped wrapping code fence",
            "escaped bare ampersands",
            "closed tags left open at end of document",
        ]
    );
    assert!(report.fixed_xml.unwrap().contains("value=\"R&amp;D\""));
}

#[test]
fn hopeless_cell_blocks_are_dropped() {
    let xml = concat!(
        "<mxGraphModel><root><mxCell id=\"0\" /><mxCell id=\"1\" parent=\"0\" />\n",
        "<mxCell id=\"keep\" value=\"fine\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxGeometry x=\"0\" y=\"0\" width=\"100\" height=\"40\" as=\"geometry\" /></mxCell>\n",
        "<mxCell id=\"bad\" value=\"unterminated />\n",
        "</root></mxGraphModel>",
    );
    let report = validate_and_fix(xml);
    assert!(report.valid);
    assert_eq!(report.applied_fixes.len(), 1);
    assert!(report.applied_fixes[0].starts_with("dropped an unparseable cell block"));
    let fixed = report.fixed_xml.unwrap();
    assert!(fixed.contains("id=\"keep\""));
    assert!(!fixed.contains("id=\"bad\""));
}

#[test]
fn unrepairable_input_stays_invalid() {
    let report = validate_and_fix("<<<<");
    assert!(!report.valid);
    assert_eq!(report.violation.unwrap().code, ViolationCode::MalformedXml);
    assert!(report.fixed_xml.is_none());
    assert!(report.applied_fixes.is_empty());
}

#[test]
fn fix_reports_serialize_in_camel_case() {
    let report = validate_and_fix(&empty_diagram());
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value, serde_json::json!({"valid": true, "appliedFixes": []}));
}
