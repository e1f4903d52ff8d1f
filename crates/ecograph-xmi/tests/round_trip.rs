//! Parse, serialise and re-parse documents end to end.

use std::sync::Arc;

use ecograph_store::{Resource, ResourceSet};
use ecograph_types::{DynamicObject, EntityId, Value};
use ecograph_xmi::{ecore, install, parse_str, serialize, XmiConfig, XmiError};

const TEAM: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<team:Team xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:team="http://example.org/team" name="platform" size="3">
  <members xsi:type="team:Member" name="ann" age="31"/>
  <members xsi:type="team:Member" name="bob" age="27"/>
  <members xsi:type="team:Member" name="cyd" age="45"/>
  <leader href="#//@members.0"/>
</team:Team>
"##;

const PEOPLE_ECORE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<ecore:EPackage xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore"
    name="people" nsURI="http://example.org/people" nsPrefix="people">
  <eClassifiers xsi:type="ecore:EClass" name="Directory">
    <eStructuralFeatures xsi:type="ecore:EReference" name="people" upperBound="-1"
        eType="#//Person" containment="true"/>
  </eClassifiers>
  <eClassifiers xsi:type="ecore:EClass" name="Person">
    <eStructuralFeatures xsi:type="ecore:EAttribute" name="name"
        eType="ecore:EDataType http://www.eclipse.org/emf/2002/Ecore#//EString"/>
    <eStructuralFeatures xsi:type="ecore:EAttribute" name="code"
        eType="ecore:EDataType http://www.eclipse.org/emf/2002/Ecore#//EString"/>
    <eStructuralFeatures xsi:type="ecore:EAttribute" name="age"
        eType="ecore:EDataType http://www.eclipse.org/emf/2002/Ecore#//EInt"/>
    <eStructuralFeatures xsi:type="ecore:EReference" name="friends" upperBound="-1"
        eType="#//Person"/>
  </eClassifiers>
  <eClassifiers xsi:type="ecore:EClass" name="Employee" eSuperTypes="#//Person">
    <eStructuralFeatures xsi:type="ecore:EAttribute" name="salary"
        eType="ecore:EDataType http://www.eclipse.org/emf/2002/Ecore#//EDouble"/>
  </eClassifiers>
</ecore:EPackage>
"##;

const DIRECTORY: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<people:Directory xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:people="http://example.org/people">
  <people name="ann" code="42" age="30" friends="//@people.1"/>
  <people xsi:type="people:Employee" name="bob" code="7" age="41" salary="1000"
      friends="//@people.0"/>
</people:Directory>
"##;

async fn names(resource: &Resource, ids: &[EntityId]) -> Vec<String> {
    let mut out = Vec::new();
    for id in ids {
        let object = resource.resolve(*id).await.unwrap();
        out.push(object.name().unwrap_or_default().to_string());
    }
    out
}

fn members_of(team: &DynamicObject) -> Vec<EntityId> {
    team.get("members").map(Value::references).unwrap_or_default()
}

#[tokio::test]
async fn inferred_team_survives_a_round_trip() {
    let first = Resource::new("mem://team");
    let report = parse_str(&first, TEAM).await.unwrap();
    assert_eq!(report.objects, 4);
    assert_eq!(report.unresolved, 0);

    let text = serialize(&first, &XmiConfig::default()).await.unwrap();
    let second = Resource::new("mem://team-copy");
    parse_str(&second, &text).await.unwrap();

    for resource in [&first, &second] {
        let roots = resource.get_roots().await;
        assert_eq!(roots.len(), 1);
        let team = &roots[0];
        assert_eq!(team.get("name"), Some(&Value::String("platform".into())));
        assert_eq!(team.get("size"), Some(&Value::Int(3)));
        let members = members_of(team);
        assert_eq!(names(resource, &members).await, ["ann", "bob", "cyd"]);
        let leader = team.get("leader").and_then(Value::as_reference).unwrap();
        assert_eq!(leader, members[0]);
        assert_eq!(
            resource.get_feature(members[0], "age").await,
            Some(Value::Int(31))
        );
        for member in &members {
            assert_eq!(resource.container_of(*member).await, Some(team.id()));
        }
    }
}

async fn people_set() -> (Arc<ResourceSet>, Arc<Resource>) {
    let set = ResourceSet::new();
    let schema = set.create_resource("file:///models/people.ecore").await;
    let report = parse_str(&schema, PEOPLE_ECORE).await.unwrap();
    assert_eq!(report.unresolved, 0);
    for package in ecore::packages_of(&schema).await {
        let ns_uri = package.ns_uri.clone();
        set.register_metamodel(Arc::new(package), &ns_uri).await;
    }
    (set, schema)
}

#[tokio::test]
async fn schema_document_becomes_a_registered_metamodel() {
    let (set, _) = people_set().await;
    let package = set.get_metamodel("http://example.org/people").await.unwrap();
    assert_eq!(package.name, "people");

    let employee = package.class("Employee").unwrap();
    assert_eq!(employee.super_types, vec!["Person".to_string()]);
    assert!(employee.attribute("name").is_some());
    assert_eq!(
        employee.attribute("age").map(|a| a.data_type),
        Some(ecograph_types::DataType::Int)
    );
    assert_eq!(
        employee.attribute("salary").map(|a| a.data_type),
        Some(ecograph_types::DataType::Double)
    );
    let people = package.class("Directory").unwrap().reference("people").unwrap();
    assert!(people.containment);
    assert!(people.many);
    assert_eq!(people.target_type, "Person");
}

#[tokio::test]
async fn instances_parse_against_the_registered_metamodel() {
    let (set, _) = people_set().await;
    let directory = set.create_resource("file:///models/directory.xmi").await;
    let report = parse_str(&directory, DIRECTORY).await.unwrap();
    assert_eq!(report.objects, 3);
    assert_eq!(report.unresolved, 0);

    let root = &directory.get_roots().await[0];
    assert_eq!(root.class().name, "Directory");
    let people = root.get("people").map(Value::references).unwrap();
    let ann = directory.resolve(people[0]).await.unwrap();
    let bob = directory.resolve(people[1]).await.unwrap();
    assert_eq!(ann.class().name, "Person");
    assert_eq!(bob.class().name, "Employee");
    assert_eq!(ann.get("code"), Some(&Value::String("42".into())));
    assert_eq!(bob.get("salary"), Some(&Value::Double(1000.0)));
    assert_eq!(ann.get("friends"), Some(&Value::ReferenceList(vec![bob.id()])));

    let text = serialize(&directory, &XmiConfig::default()).await.unwrap();
    assert!(text.contains(r#"xsi:type="people:Employee""#));
    let copy = set.create_resource("file:///models/directory-copy.xmi").await;
    parse_str(&copy, &text).await.unwrap();
    let root = &copy.get_roots().await[0];
    let people = root.get("people").map(Value::references).unwrap();
    assert_eq!(names(&copy, &people).await, ["ann", "bob"]);
    assert_eq!(
        copy.get_feature(people[1], "friends").await,
        Some(Value::ReferenceList(vec![people[0]]))
    );
    assert_eq!(copy.get_feature(people[1], "age").await, Some(Value::Int(41)));
}

#[tokio::test]
async fn schema_document_round_trips() {
    let (set, schema) = people_set().await;
    let text = serialize(&schema, &XmiConfig::default()).await.unwrap();
    assert!(text.contains(r##"eSuperTypes="#//Person""##));

    let copy = set.create_resource("file:///models/people-copy.ecore").await;
    let report = parse_str(&copy, &text).await.unwrap();
    assert_eq!(report.unresolved, 0);
    let packages = ecore::packages_of(&copy).await;
    assert_eq!(packages.len(), 1);
    let names: Vec<&str> = packages[0].classes().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Directory", "Person", "Employee"]);
}

#[tokio::test]
async fn hrefs_cross_documents_through_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("b.xmi"),
        r#"<p:Person xmlns:p="urn:p" name="bob"/>"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("a.xmi"),
        r#"<p:Person xmlns:p="urn:p" name="ann"><friend href="b.xmi#/"/></p:Person>"#,
    )
    .unwrap();

    let set = ResourceSet::new();
    install(&set).await;
    let a_uri = format!("file://{}", dir.path().join("a.xmi").display());
    let b_uri = format!("file://{}", dir.path().join("b.xmi").display());
    let a = set.load_resource(&a_uri).await.unwrap();

    let ann = &a.get_roots().await[0];
    let friend = ann.get("friend").and_then(Value::as_reference).unwrap();
    let (bob, owner) = set.resolve(friend).await.unwrap();
    assert_eq!(bob.name(), Some("bob"));
    assert_eq!(owner.uri(), b_uri);

    let text = serialize(&a, &XmiConfig::default()).await.unwrap();
    assert!(text.contains(&format!(r#"href="{b_uri}#/""#)));
}

#[tokio::test]
async fn documents_without_a_root_are_rejected() {
    let resource = Resource::new("mem://blank");
    assert!(matches!(
        parse_str(&resource, "<?xml version=\"1.0\"?>\n  \n").await,
        Err(XmiError::MissingRoot)
    ));
}
