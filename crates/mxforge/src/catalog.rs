//! Static per-kind metadata: default sizes, base style fragments, edge and
//! container classification, and the cloud-provider service→shape lookups.
//!
//! Style fragments are chosen so every kind stays recoverable from its style
//! string alone; the ordered predicates in `parse` rely on these signatures.

use crate::component::Component;

/// Reserved ids present in every document.
pub const ROOT_ID: &str = "0";
pub const LAYER_ID: &str = "1";

/// Constant trailing tokens of every vertex style: word wrap plus markup
/// label rendering.
pub const TRAILING_STYLE: &str = "whiteSpace=wrap;html=1";

pub fn is_edge(component: &Component) -> bool {
    component.is_connector()
}

/// Containers accumulate derived `children`. Deliberately narrow: only
/// swimlanes and groups qualify, tables do not.
pub fn is_container(component: &Component) -> bool {
    matches!(component, Component::Swimlane(_) | Component::Group(_))
}

/// Size used when a component omits explicit width/height.
pub fn default_size(component: &Component) -> (f64, f64) {
    use Component::*;
    match component {
        Rectangle(_) | RoundedRectangle(_) | Parallelogram(_) | Trapezoid(_) | Process(_) => {
            (120.0, 60.0)
        }
        Ellipse(_) | Hexagon(_) | Document(_) | Cloud(_) | Callout(_) => (120.0, 80.0),
        Diamond(_) => (80.0, 80.0),
        Triangle(_) | Cylinder(_) => (60.0, 80.0),
        Step(_) => (120.0, 80.0),
        Note(_) => (80.0, 100.0),
        Text(_) => (60.0, 30.0),
        Image(_) => (80.0, 80.0),
        Swimlane(_) | Group(_) => (200.0, 200.0),
        Aws(_) => (78.0, 78.0),
        Azure(_) | Gcp(_) => (64.0, 64.0),
        UmlClass(_) | UmlInterface(_) => (160.0, 110.0),
        UmlPackage(_) => (110.0, 50.0),
        NetworkServer(_) | NetworkRouter(_) | NetworkSwitch(_) | NetworkFirewall(_) => {
            (80.0, 80.0)
        }
        Card(_) => (130.0, 80.0),
        List(_) => (140.0, 120.0),
        Timeline(_) => (160.0, 120.0),
        Table(_) => (180.0, 120.0),
        Actor(_) => (40.0, 60.0),
        Connector(_) => (0.0, 0.0),
    }
}

/// Stack-layout recipe shared by UML class and interface shapes. Interfaces
/// are told apart by the stereotype line in the label, not the style.
pub const UML_MEMBER_BOX: &str = "swimlane;childLayout=stackLayout;fontStyle=1;horizontal=1;\
startSize=26;horizontalStack=0;resizeParent=1;collapsible=1;marginBottom=0";

/// Kind-specific leading style fragment. Cloud icons resolve their service
/// name to a provider shape token here.
pub fn base_style(component: &Component) -> String {
    use Component::*;
    match component {
        Rectangle(_) => "rounded=0".into(),
        RoundedRectangle(_) => "rounded=1".into(),
        Ellipse(_) => "ellipse".into(),
        Diamond(_) => "rhombus".into(),
        Hexagon(_) => "shape=hexagon;perimeter=hexagonPerimeter2".into(),
        Triangle(_) => "triangle".into(),
        Cylinder(_) => "shape=cylinder3;boundedLbl=1;backgroundOutline=1;size=15".into(),
        Parallelogram(_) => "shape=parallelogram;perimeter=parallelogramPerimeter".into(),
        Trapezoid(_) => "shape=trapezoid;perimeter=trapezoidPerimeter".into(),
        Step(_) => "shape=step;perimeter=stepPerimeter".into(),
        Note(_) => "shape=note;backgroundOutline=1;darkOpacity=0.05".into(),
        Text(_) => "text;strokeColor=none;fillColor=none".into(),
        Image(_) => "shape=image;imageAspect=0".into(),
        Swimlane(_) => "swimlane".into(),
        Group(_) => "group".into(),
        Aws(icon) => format!(
            "sketch=0;outlineConnect=0;fontColor=#232F3E;fillColor=#E7157B;strokeColor=none;\
verticalLabelPosition=bottom;verticalAlign=top;align=center;shape=mxgraph.aws4.{}",
            aws_shape_token(&icon.service)
        ),
        Azure(icon) => format!(
            "sketch=0;outlineConnect=0;fontColor=#323130;fillColor=#0078D4;strokeColor=none;\
verticalLabelPosition=bottom;verticalAlign=top;align=center;shape=mxgraph.azure.{}",
            azure_shape_token(&icon.service)
        ),
        Gcp(icon) => format!(
            "sketch=0;outlineConnect=0;fontColor=#5F6368;fillColor=#4285F4;strokeColor=none;\
verticalLabelPosition=bottom;verticalAlign=top;align=center;shape=mxgraph.gcp2.{}",
            gcp_shape_token(&icon.service)
        ),
        UmlClass(_) | UmlInterface(_) => UML_MEMBER_BOX.into(),
        UmlPackage(_) => {
            "shape=folder;fontStyle=1;spacingTop=10;tabWidth=40;tabHeight=14;tabPosition=left"
                .into()
        }
        NetworkServer(_) => network_style("server"),
        NetworkRouter(_) => network_style("router"),
        NetworkSwitch(_) => network_style("switch"),
        NetworkFirewall(_) => network_style("firewall"),
        Card(_) => "shape=card".into(),
        List(_) => "shape=list".into(),
        Timeline(_) => "shape=timeline".into(),
        Table(_) => "shape=table;startSize=30".into(),
        Process(_) => "shape=process".into(),
        Callout(_) => "shape=callout;perimeter=calloutPerimeter".into(),
        Actor(_) => "shape=actor".into(),
        Document(_) => "shape=document;boundedLbl=1".into(),
        Cloud(_) => "ellipse;shape=cloud".into(),
        Connector(_) => String::new(),
    }
}

fn network_style(device: &str) -> String {
    format!(
        "verticalLabelPosition=bottom;verticalAlign=top;aspect=fixed;align=center;\
shape=mxgraph.networks.{device};fillColor=#29AAE1;strokeColor=#ffffff"
    )
}

fn normalize_service(service: &str) -> String {
    service.trim().to_ascii_lowercase()
}

/// Lower-cases and underscore-joins a service name into a plausible shape
/// token. Used when a provider table has no entry; the icon may be
/// approximate but conversion never fails.
pub fn synthesize_token(service: &str) -> String {
    service
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// AWS service name → `mxgraph.aws4` shape token.
pub fn aws_shape_token(service: &str) -> String {
    let token = match normalize_service(service).as_str() {
        "lambda" => "lambda",
        "s3" => "s3",
        "ec2" => "ec2",
        "rds" => "rds",
        "aurora" => "aurora",
        "dynamodb" => "dynamodb",
        "api gateway" => "api_gateway",
        "cloudfront" => "cloudfront",
        "route 53" => "route_53",
        "sqs" => "sqs",
        "sns" => "sns",
        "ecs" => "ecs",
        "eks" => "eks",
        "fargate" => "fargate",
        "kinesis" => "kinesis",
        "redshift" => "redshift",
        "cloudwatch" => "cloudwatch",
        "iam" => "identity_and_access_management",
        "cognito" => "cognito",
        "elasticache" => "elasticache",
        "load balancer" => "elastic_load_balancing",
        "step functions" => "step_functions",
        _ => return synthesize_token(service),
    };
    token.to_owned()
}

/// `mxgraph.aws4` token → canonical service name. Synthesized tokens come
/// back space-joined.
pub fn aws_service_name(token: &str) -> String {
    let name = match token {
        "lambda" => "Lambda",
        "s3" => "S3",
        "ec2" => "EC2",
        "rds" => "RDS",
        "aurora" => "Aurora",
        "dynamodb" => "DynamoDB",
        "api_gateway" => "API Gateway",
        "cloudfront" => "CloudFront",
        "route_53" => "Route 53",
        "sqs" => "SQS",
        "sns" => "SNS",
        "ecs" => "ECS",
        "eks" => "EKS",
        "fargate" => "Fargate",
        "kinesis" => "Kinesis",
        "redshift" => "Redshift",
        "cloudwatch" => "CloudWatch",
        "identity_and_access_management" => "IAM",
        "cognito" => "Cognito",
        "elasticache" => "ElastiCache",
        "elastic_load_balancing" => "Load Balancer",
        "step_functions" => "Step Functions",
        _ => return token.replace('_', " "),
    };
    name.to_owned()
}

/// Azure service name → `mxgraph.azure` shape token.
pub fn azure_shape_token(service: &str) -> String {
    let token = match normalize_service(service).as_str() {
        "virtual machine" | "vm" => "virtual_machine",
        "sql database" | "sql" => "sql_database",
        "blob storage" => "storage_blob",
        "website" | "app service" => "website",
        "cloud service" => "cloud_service",
        "service bus" => "service_bus",
        "virtual network" | "vnet" => "virtual_network",
        "traffic manager" => "traffic_manager",
        "cdn" => "cdn",
        "event hubs" => "event_hubs",
        "active directory" => "active_directory",
        "key vault" => "key_vault",
        "redis cache" | "redis" => "cache_including_redis",
        "hdinsight" => "hdinsight",
        "machine learning" => "machine_learning",
        "stream analytics" => "stream_analytics",
        _ => return synthesize_token(service),
    };
    token.to_owned()
}

/// `mxgraph.azure` token → canonical service name.
pub fn azure_service_name(token: &str) -> String {
    let name = match token {
        "virtual_machine" => "Virtual Machine",
        "sql_database" => "SQL Database",
        "storage_blob" => "Blob Storage",
        "website" => "Website",
        "cloud_service" => "Cloud Service",
        "service_bus" => "Service Bus",
        "virtual_network" => "Virtual Network",
        "traffic_manager" => "Traffic Manager",
        "cdn" => "CDN",
        "event_hubs" => "Event Hubs",
        "active_directory" => "Active Directory",
        "key_vault" => "Key Vault",
        "cache_including_redis" => "Redis Cache",
        "hdinsight" => "HDInsight",
        "machine_learning" => "Machine Learning",
        "stream_analytics" => "Stream Analytics",
        _ => return token.replace('_', " "),
    };
    name.to_owned()
}

/// GCP service name → `mxgraph.gcp2` shape token.
pub fn gcp_shape_token(service: &str) -> String {
    let token = match normalize_service(service).as_str() {
        "compute engine" => "compute_engine",
        "cloud storage" | "storage" => "cloud_storage",
        "cloud sql" => "cloud_sql",
        "bigquery" => "bigquery",
        "cloud functions" | "functions" => "cloud_functions",
        "kubernetes engine" | "gke" => "kubernetes_engine",
        "app engine" => "app_engine",
        "pub/sub" | "pubsub" => "cloud_pubsub",
        "spanner" => "cloud_spanner",
        "bigtable" => "cloud_bigtable",
        "datastore" => "cloud_datastore",
        "dataflow" => "cloud_dataflow",
        "dataproc" => "cloud_dataproc",
        "cloud cdn" => "cloud_cdn",
        "cloud dns" => "cloud_dns",
        "load balancing" => "cloud_load_balancing",
        _ => return synthesize_token(service),
    };
    token.to_owned()
}

/// `mxgraph.gcp2` token → canonical service name.
pub fn gcp_service_name(token: &str) -> String {
    let name = match token {
        "compute_engine" => "Compute Engine",
        "cloud_storage" => "Cloud Storage",
        "cloud_sql" => "Cloud SQL",
        "bigquery" => "BigQuery",
        "cloud_functions" => "Cloud Functions",
        "kubernetes_engine" => "Kubernetes Engine",
        "app_engine" => "App Engine",
        "cloud_pubsub" => "Pub/Sub",
        "cloud_spanner" => "Spanner",
        "cloud_bigtable" => "Bigtable",
        "cloud_datastore" => "Datastore",
        "cloud_dataflow" => "Dataflow",
        "cloud_dataproc" => "Dataproc",
        "cloud_cdn" => "Cloud CDN",
        "cloud_dns" => "Cloud DNS",
        "cloud_load_balancing" => "Load Balancing",
        _ => return token.replace('_', " "),
    };
    name.to_owned()
}
