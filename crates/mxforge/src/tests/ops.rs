use crate::*;
use crate::component::Shape;

fn seeded() -> String {
    let mut a = Shape::new("box1", "Orders");
    a.common.x = Some(40.0);
    a.common.y = Some(40.0);
    let mut b = Shape::new("box2", "Billing");
    b.common.x = Some(320.0);
    b.common.y = Some(40.0);
    components_to_xml(&[
        Component::Rectangle(a),
        Component::Rectangle(b),
        Component::Connector(ConnectorShape::new("edge1", "box1", "box2")),
    ])
}

#[test]
fn operations_decode_from_wire_json() {
    let ops: Vec<DiagramOperation> = serde_json::from_str(
        r#"[
        {"type": "setCellValue", "id": "box1", "value": "Hello"},
        {"type": "updateCell", "id": "box1", "geometry": {"x": 40, "width": 160}},
        {"type": "setEdgePoints", "id": "edge1", "sourcePoint": {"x": 10, "y": 20}},
        {"type": "deleteCell", "id": "gone"},
        {"type": "addComponent", "component": {"kind": "ellipse", "id": "n9", "label": "New"}},
        {"type": "connectComponents", "id": "e9", "source": "box1", "target": "n9"}
    ]"#,
    )
    .unwrap();
    assert_eq!(ops.len(), 6);
    assert_eq!(
        ops[0],
        DiagramOperation::SetCellValue {
            id: "box1".into(),
            value: "Hello".into(),
            escape: None,
        }
    );
    let DiagramOperation::UpdateCell {
        geometry: Some(patch),
        ..
    } = &ops[1]
    else {
        panic!("expected updateCell with geometry, got {:?}", ops[1]);
    };
    assert_eq!(patch.x, Some(40.0));
    assert_eq!(patch.width, Some(160.0));
    assert_eq!(patch.height, None);

    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(validate_cell_structure(&result).is_none());
    assert!(result.contains(r#"id="e9""#));
}

#[test]
fn batch_aborts_on_first_failing_operation() {
    let ops = [
        DiagramOperation::AddComponent {
            component: Component::Rectangle(Shape::new("a", "A")),
        },
        DiagramOperation::ConnectComponents {
            id: "c1".into(),
            source: "a".into(),
            target: "missing".into(),
            label: None,
            style: None,
            waypoints: None,
        },
    ];
    let err = apply_diagram_ops(&empty_diagram(), &ops).unwrap_err();
    assert_eq!(
        err.to_string(),
        "connectComponents: endpoint [missing] of connector [c1] does not resolve to an existing component"
    );
}

#[test]
fn markup_values_escape_idempotently() {
    let op = [DiagramOperation::SetCellValue {
        id: "box1".into(),
        value: "<b>Total &amp; VAT</b>\nDue".into(),
        escape: None,
    }];
    let once = apply_diagram_ops(&seeded(), &op).unwrap();
    assert!(once.contains(r#"value="&lt;b&gt;Total &amp; VAT&lt;/b&gt;&lt;br&gt;Due""#));

    let twice = apply_diagram_ops(&once, &op).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn set_cell_value_can_skip_the_markup_rule() {
    let ops = [DiagramOperation::SetCellValue {
        id: "box1".into(),
        value: "&lt;b&gt;kept&lt;/b&gt;".into(),
        escape: Some(false),
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"value="&lt;b&gt;kept&lt;/b&gt;""#));
}

#[test]
fn plain_values_are_stored_verbatim() {
    let ops = [DiagramOperation::SetCellValue {
        id: "box1".into(),
        value: "Orders v2".into(),
        escape: None,
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"value="Orders v2""#));
    assert!(!result.contains(r#"value="Orders""#));
}

#[test]
fn missing_targets_abort_with_cell_not_found() {
    let ops = [DiagramOperation::SetCellValue {
        id: "ghost".into(),
        value: "x".into(),
        escape: None,
    }];
    let err = apply_diagram_ops(&seeded(), &ops).unwrap_err();
    assert_eq!(
        err.to_string(),
        "setCellValue: no cell with id [ghost] exists in the document"
    );
}

#[test]
fn update_cell_patches_style_and_geometry_in_place() {
    let ops = [DiagramOperation::UpdateCell {
        id: "box1".into(),
        value: Some("Orders v2".into()),
        style: Some("rounded=1;fillColor=#DAE8FC;whiteSpace=wrap;html=1;".into()),
        geometry: Some(CellGeometry {
            x: Some(64.0),
            ..CellGeometry::default()
        }),
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"value="Orders v2""#));
    assert!(result.contains(r#"style="rounded=1;fillColor=#DAE8FC;whiteSpace=wrap;html=1;""#));
    assert!(result.contains(r#"x="64""#));
    // untouched geometry fields survive the patch
    assert!(result.contains(r#"width="120""#));
}

#[test]
fn add_cell_appends_a_vertex_with_geometry() {
    let ops = [DiagramOperation::AddCell {
        id: "note1".into(),
        parent: "1".into(),
        value: Some("todo".into()),
        style: Some("shape=note;whiteSpace=wrap;html=1;".into()),
        vertex: Some(true),
        edge: None,
        source: None,
        target: None,
        geometry: Some(CellGeometry {
            x: Some(600.0),
            y: Some(40.0),
            width: Some(80.0),
            height: Some(100.0),
            relative: None,
        }),
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(validate_cell_structure(&result).is_none());
    assert!(result.contains(r#"value="todo""#));
    assert!(
        result.contains(r#"<mxGeometry as="geometry" x="600" y="40" width="80" height="100" />"#)
    );
}

#[test]
fn add_cell_rejects_unknown_parents_and_taken_ids() {
    let base = seeded();
    let orphan = [DiagramOperation::AddCell {
        id: "n5".into(),
        parent: "ghost".into(),
        value: None,
        style: None,
        vertex: Some(true),
        edge: None,
        source: None,
        target: None,
        geometry: None,
    }];
    let err = apply_diagram_ops(&base, &orphan).unwrap_err();
    assert_eq!(
        err.to_string(),
        "addCell: declared parent [ghost] of cell [n5] does not exist; reference an existing cell or the default layer \"1\""
    );

    let collision = [DiagramOperation::AddCell {
        id: "box1".into(),
        parent: "1".into(),
        value: None,
        style: None,
        vertex: Some(true),
        edge: None,
        source: None,
        target: None,
        geometry: None,
    }];
    let err = apply_diagram_ops(&base, &collision).unwrap_err();
    assert_eq!(
        err.to_string(),
        "addCell: a cell with id [box1] already exists; pick an unused id"
    );
}

#[test]
fn delete_cell_removes_the_cell_and_ignores_unknown_ids() {
    let removed = apply_diagram_ops(
        &seeded(),
        &[DiagramOperation::DeleteCell { id: "box2".into() }],
    )
    .unwrap();
    assert!(!removed.contains(r#"id="box2""#));
    // edge1 still references box2; deletion does not cascade
    assert!(removed.contains(r#"target="box2""#));
    assert_eq!(
        validate_cell_structure(&removed).unwrap().code,
        ViolationCode::InvalidEdgeRef
    );

    let untouched = apply_diagram_ops(
        &seeded(),
        &[DiagramOperation::DeleteCell { id: "nope".into() }],
    )
    .unwrap();
    assert!(untouched.contains(r#"id="box2""#));
}

#[test]
fn update_component_merges_recognized_style_keys() {
    let ops = [DiagramOperation::UpdateComponent {
        id: "box1".into(),
        x: None,
        y: None,
        width: Some(180.0),
        height: None,
        label: Some("Orders API".into()),
        title: None,
        text: None,
        fill_color: Some("#D5E8D4".into()),
        stroke_color: None,
        stroke_width: None,
        opacity: None,
        font_size: Some(16.0),
        font_color: None,
        shadow: Some(true),
        dashed: None,
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"value="Orders API""#));
    // existing tokens keep their order; new keys append
    assert!(result.contains("rounded=0;whiteSpace=wrap;html=1;fillColor=#D5E8D4;fontSize=16;shadow=1;"));
    assert!(result.contains(r#"width="180""#));
}

#[test]
fn set_edge_points_rebuilds_the_edge_geometry() {
    let ops = [DiagramOperation::SetEdgePoints {
        id: "edge1".into(),
        source_point: Some(Point::new(160.0, 70.0)),
        target_point: Some(Point::new(320.0, 70.0)),
        waypoints: Some(vec![Point::new(240.0, 110.0)]),
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"<mxPoint x="160" y="70" as="sourcePoint" />"#));
    assert!(result.contains(r#"<mxPoint x="320" y="70" as="targetPoint" />"#));
    assert!(result.contains(r#"<Array as="points">"#));
    assert!(result.contains(r#"<mxPoint x="240" y="110" />"#));
    assert!(validate_cell_structure(&result).is_none());
}

#[test]
fn set_edge_points_rejects_vertices() {
    let ops = [DiagramOperation::SetEdgePoints {
        id: "box1".into(),
        source_point: None,
        target_point: None,
        waypoints: None,
    }];
    let err = apply_diagram_ops(&seeded(), &ops).unwrap_err();
    assert_eq!(err.to_string(), "setEdgePoints: cell [box1] is not an edge");
}

#[test]
fn connect_components_applies_connector_style() {
    let ops = [DiagramOperation::ConnectComponents {
        id: "e2".into(),
        source: "box2".into(),
        target: "box1".into(),
        label: Some("refund".into()),
        style: Some(ConnectorStyle {
            routing: Routing::Curved,
            ..ConnectorStyle::default()
        }),
        waypoints: Some(vec![Point::new(200.0, 160.0)]),
    }];
    let result = apply_diagram_ops(&seeded(), &ops).unwrap();
    assert!(result.contains(r#"value="refund""#));
    assert!(result.contains("edgeStyle=orthogonalEdgeStyle;curved=1;endArrow=classic;startArrow=none;html=1;"));
    assert!(validate_cell_structure(&result).is_none());
}

#[test]
fn object_wrappers_store_values_in_the_label_attribute() {
    let xml = concat!(
        "<mxGraphModel>\n  <root>\n    <mxCell id=\"0\" />\n    <mxCell id=\"1\" parent=\"0\" />\n",
        "    <object id=\"o1\" label=\"Old\">\n",
        "      <mxCell style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">\n",
        "        <mxGeometry x=\"40\" y=\"40\" width=\"120\" height=\"60\" as=\"geometry\" />\n",
        "      </mxCell>\n    </object>\n  </root>\n</mxGraphModel>",
    );
    let ops = [DiagramOperation::SetCellValue {
        id: "o1".into(),
        value: "<b>New</b>".into(),
        escape: None,
    }];
    let result = apply_diagram_ops(xml, &ops).unwrap();
    assert!(result.contains(r#"label="&lt;b&gt;New&lt;/b&gt;""#));
    assert!(!result.contains(r#"label="Old""#));
}

#[test]
fn loose_fragments_gain_the_envelope_before_edits() {
    let fragment = concat!(
        "<mxCell id=\"solo\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxGeometry x=\"0\" y=\"0\" width=\"100\" height=\"40\" as=\"geometry\" /></mxCell>",
    );
    let ops = [DiagramOperation::SetCellValue {
        id: "solo".into(),
        value: "named".into(),
        escape: None,
    }];
    let result = apply_diagram_ops(fragment, &ops).unwrap();
    assert!(result.starts_with("<mxfile"));
    assert!(result.contains(r#"value="named""#));
    assert!(validate_cell_structure(&result).is_none());
}
